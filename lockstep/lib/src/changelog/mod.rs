//! Release-notes aggregation for upgraded dependencies.
//!
//! For every upgrade record, providers are queried in priority order:
//!
//! 1. **Release API** - GitHub releases of a guessed repository, filtered to the
//!    upgraded version range
//! 2. **Registry metadata** - the gem's changelog or source code URL
//! 3. **Placeholder** - a link to the gem's registry page
//!
//! ## Module Structure
//!
//! - [`types`]: entries, report, sources and errors
//! - [`candidates`]: repository name heuristics
//! - [`github`]: release-listing client
//! - [`registry`]: registry metadata client
//! - [`provider`]: the provider trait and built-in provider set
//! - [`aggregator`]: ordered fallback and report assembly

pub mod aggregator;
pub mod candidates;
pub mod github;
pub mod provider;
pub mod registry;
pub mod types;

pub use aggregator::ChangelogAggregator;
pub use provider::{ReleaseNotesProvider, Source};
pub use types::{
    AggregateOutcome, ChangelogEntry, ChangelogError, ChangelogReport, ChangelogSource,
    ReleaseNotes,
};
