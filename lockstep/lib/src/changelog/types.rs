//! Core types for changelog aggregation.

use crate::lockfile::{LockfileError, UpgradeRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error types for changelog operations.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from an external source
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Release API rate limit exceeded
    #[error("Release API rate limit exceeded")]
    RateLimited,

    /// Reading the upgrade artifact failed
    #[error(transparent)]
    Artifact(#[from] LockfileError),

    /// Writing the report failed
    #[error("Failed to write report {path}: {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a changelog entry's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangelogSource {
    /// Release notes from the release-listing API
    ReleaseApi,
    /// Changelog or source URL from registry metadata
    RegistryMetadata,
    /// Nothing found; the entry is a placeholder
    None,
}

/// Notes produced by one provider for one upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNotes {
    pub source: ChangelogSource,
    /// Which repository or registry answered (e.g. `rails/rack`)
    pub origin: Option<String>,
    /// Release text, or a URL for registry metadata
    pub text_or_url: String,
}

/// Assembled release notes (or fallback) for one upgrade record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    pub dependency: String,
    pub old_version: String,
    pub new_version: String,
    pub source: ChangelogSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub text_or_url: String,
}

impl ChangelogEntry {
    pub fn from_notes(record: &UpgradeRecord, notes: ReleaseNotes) -> Self {
        Self {
            dependency: record.dependency.clone(),
            old_version: record.old_version.clone(),
            new_version: record.new_version.clone(),
            source: notes.source,
            origin: notes.origin,
            text_or_url: notes.text_or_url,
        }
    }

    /// Entry used when no source produced anything; points at the registry page.
    pub fn placeholder(record: &UpgradeRecord, registry_page: impl Into<String>) -> Self {
        Self {
            dependency: record.dependency.clone(),
            old_version: record.old_version.clone(),
            new_version: record.new_version.clone(),
            source: ChangelogSource::None,
            origin: None,
            text_or_url: registry_page.into(),
        }
    }

    /// `dependency (old → new)`
    pub fn heading(&self) -> String {
        format!(
            "{} ({} → {})",
            self.dependency, self.old_version, self.new_version
        )
    }

    /// One report section.
    ///
    /// ## Examples
    ///
    /// ```
    /// use lockstep_lib::changelog::ChangelogEntry;
    /// use lockstep_lib::lockfile::UpgradeRecord;
    ///
    /// let record = UpgradeRecord::new("left-pad", "1.0", "1.1");
    /// let entry = ChangelogEntry::placeholder(&record, "https://rubygems.org/gems/left-pad");
    /// assert_eq!(
    ///     entry.render(),
    ///     "## left-pad (1.0 → 1.1)\n\nNo changelog found. Check: https://rubygems.org/gems/left-pad\n\n---\n"
    /// );
    /// ```
    pub fn render(&self) -> String {
        let body = match self.source {
            ChangelogSource::ReleaseApi => match &self.origin {
                Some(origin) => format!("_Source: GitHub releases ({})_\n\n{}", origin, self.text_or_url),
                None => self.text_or_url.clone(),
            },
            ChangelogSource::RegistryMetadata => format!("Changelog: {}", self.text_or_url),
            ChangelogSource::None => format!("No changelog found. Check: {}", self.text_or_url),
        };
        format!("## {}\n\n{}\n\n---\n", self.heading(), body.trim_end())
    }
}

/// The combined report: one section per upgrade record, in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangelogReport {
    pub entries: Vec<ChangelogEntry>,
}

impl ChangelogReport {
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ChangelogEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of an aggregator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AggregateOutcome {
    /// The upgrade artifact does not exist
    NoArtifact { artifact: PathBuf },
    /// The artifact holds no records; no report was written
    NoUpgrades { artifact: PathBuf },
    /// The report was written
    Written {
        report: PathBuf,
        entries: Vec<ChangelogEntry>,
    },
}
