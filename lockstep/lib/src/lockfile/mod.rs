//! Lockfile snapshot diffing.
//!
//! - [`grammar`]: the dependency-line grammar and [`VersionSnapshot`]
//! - [`diff`]: upgrade records between two snapshots and the on-disk differ
//! - [`artifact`]: the `name|old|new` interchange file

pub mod artifact;
pub mod diff;
pub mod grammar;

pub use artifact::{read_artifact, write_artifact};
pub use diff::{DiffOutcome, LockfileError, UpgradeDiffer, UpgradeRecord, diff, render_summary};
pub use grammar::{LineError, SnapshotParse, VersionSnapshot, parse_line, parse_snapshot};
