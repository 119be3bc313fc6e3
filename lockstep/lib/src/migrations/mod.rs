//! Duplicate schema-migration detection and resolution.
//!
//! - [`grammar`]: extracting the declared identifier from a migration file
//! - [`types`]: definitions, duplicate groups, resolutions and outcomes
//! - [`resolver`]: directory scan and stale-duplicate removal

pub mod grammar;
pub mod resolver;
pub mod types;

pub use resolver::{MigrationConflictResolver, Scan, detect_duplicates};
pub use types::{DuplicateGroup, MigrationDefinition, MigrationError, MigrationOutcome, Resolution};
