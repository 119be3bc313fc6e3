//! The release-notes provider abstraction.
//!
//! The aggregator only knows an ordered list of providers; each one either
//! produces notes for an upgrade, declines (`Ok(None)`), or fails. Declines and
//! failures both move on to the next provider.

use super::github::GitHubReleases;
use super::registry::RubyGemsRegistry;
use super::types::{ChangelogError, ReleaseNotes};
use crate::lockfile::UpgradeRecord;

/// A source of release notes.
///
/// ## Native Async Traits
///
/// This trait uses native async functions in traits; no `async-trait` crate
/// is needed. Providers are dispatched statically through [`Source`].
pub trait ReleaseNotesProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Attempt to produce release notes for one upgrade.
    ///
    /// ## Errors
    ///
    /// Returns `ChangelogError` when the source could not be queried. The
    /// aggregator treats that the same as `Ok(None)`.
    fn release_notes(
        &self,
        record: &UpgradeRecord,
    ) -> impl std::future::Future<Output = Result<Option<ReleaseNotes>, ChangelogError>> + Send;
}

impl ReleaseNotesProvider for GitHubReleases {
    fn name(&self) -> &'static str {
        "github-releases"
    }

    async fn release_notes(
        &self,
        record: &UpgradeRecord,
    ) -> Result<Option<ReleaseNotes>, ChangelogError> {
        Ok(self.notes_for(record).await)
    }
}

impl ReleaseNotesProvider for RubyGemsRegistry {
    fn name(&self) -> &'static str {
        "rubygems-metadata"
    }

    async fn release_notes(
        &self,
        record: &UpgradeRecord,
    ) -> Result<Option<ReleaseNotes>, ChangelogError> {
        self.notes_for(&record.dependency).await
    }
}

/// The built-in providers.
#[derive(Debug, Clone)]
pub enum Source {
    Releases(GitHubReleases),
    Registry(RubyGemsRegistry),
}

impl ReleaseNotesProvider for Source {
    fn name(&self) -> &'static str {
        match self {
            Source::Releases(p) => p.name(),
            Source::Registry(p) => p.name(),
        }
    }

    async fn release_notes(
        &self,
        record: &UpgradeRecord,
    ) -> Result<Option<ReleaseNotes>, ChangelogError> {
        match self {
            Source::Releases(p) => p.release_notes(record).await,
            Source::Registry(p) => p.release_notes(record).await,
        }
    }
}
