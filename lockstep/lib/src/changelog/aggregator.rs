//! Changelog aggregation over an upgrade set.
//!
//! ## Aggregation Strategy
//!
//! 1. **Sequential**: records are processed one at a time, in artifact order,
//!    and providers are tried one at a time, in configured order
//! 2. **First success wins**: the first provider returning notes ends the search
//! 3. **Graceful degradation**: provider errors are logged and skipped
//! 4. **Completeness**: a record no provider can serve gets a placeholder entry
//!    pointing at the registry page, so the report has exactly one section per record
//!
//! ## Examples
//!
//! ```rust,no_run
//! use lockstep_lib::changelog::ChangelogAggregator;
//! use lockstep_lib::config::ChangelogConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = ChangelogAggregator::from_config(&ChangelogConfig::default())?;
//! let outcome = aggregator
//!     .run("upgrades.txt".as_ref(), "changelogs.txt".as_ref())
//!     .await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

use super::github::GitHubReleases;
use super::provider::{ReleaseNotesProvider, Source};
use super::registry::RubyGemsRegistry;
use super::types::{AggregateOutcome, ChangelogEntry, ChangelogError, ChangelogReport};
use crate::config::ChangelogConfig;
use crate::lockfile::{UpgradeRecord, read_artifact};
use reqwest::Client as HttpClient;
use std::path::Path;
use tracing::{info, warn};

/// Produces one changelog entry per upgrade record.
#[derive(Debug, Clone)]
pub struct ChangelogAggregator<P = Source> {
    providers: Vec<P>,
    registry_base: String,
}

impl ChangelogAggregator<Source> {
    /// Release API first, registry metadata second.
    ///
    /// ## Errors
    ///
    /// Returns `ChangelogError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &ChangelogConfig) -> Result<Self, ChangelogError> {
        let client = HttpClient::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self::new(
            vec![
                Source::Releases(GitHubReleases::from_config(client.clone(), config)),
                Source::Registry(RubyGemsRegistry::from_config(client, config)),
            ],
            config.registry_base.as_str(),
        ))
    }
}

impl<P: ReleaseNotesProvider> ChangelogAggregator<P> {
    /// `registry_base` is used for placeholder links (`{registry_base}/gems/{name}`).
    pub fn new(providers: Vec<P>, registry_base: impl Into<String>) -> Self {
        Self {
            providers,
            registry_base: registry_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    fn placeholder_page(&self, dependency: &str) -> String {
        format!("{}/gems/{}", self.registry_base, dependency)
    }

    /// Entry for a single record. Never fails.
    pub async fn entry_for(&self, record: &UpgradeRecord) -> ChangelogEntry {
        info!(
            dependency = %record.dependency,
            old = %record.old_version,
            new = %record.new_version,
            "Fetching release notes"
        );

        for provider in &self.providers {
            match provider.release_notes(record).await {
                Ok(Some(notes)) => {
                    info!(
                        dependency = %record.dependency,
                        provider = provider.name(),
                        "Found release notes"
                    );
                    return ChangelogEntry::from_notes(record, notes);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        dependency = %record.dependency,
                        provider = provider.name(),
                        error = %e,
                        "Release notes provider failed"
                    );
                }
            }
        }

        info!(dependency = %record.dependency, "No changelog found");
        ChangelogEntry::placeholder(record, self.placeholder_page(&record.dependency))
    }

    /// One entry per record, in record order.
    pub async fn aggregate(&self, records: &[UpgradeRecord]) -> ChangelogReport {
        let mut report = ChangelogReport::default();
        for record in records {
            report.entries.push(self.entry_for(record).await);
        }
        report
    }

    /// Read the upgrade artifact, aggregate, and write the report.
    ///
    /// A missing artifact or an empty upgrade set writes nothing, and removes a
    /// report left over from an earlier run.
    ///
    /// ## Errors
    ///
    /// Returns `ChangelogError::Artifact` if the artifact exists but cannot be
    /// read, and `ChangelogError::WriteReport` if the report cannot be written
    /// or a stale one cannot be removed.
    pub async fn run(
        &self,
        artifact: &Path,
        report_path: &Path,
    ) -> Result<AggregateOutcome, ChangelogError> {
        let Some(records) = read_artifact(artifact)? else {
            info!(artifact = %artifact.display(), "No upgrades file found");
            remove_stale_report(report_path)?;
            return Ok(AggregateOutcome::NoArtifact {
                artifact: artifact.to_path_buf(),
            });
        };

        if records.is_empty() {
            info!(artifact = %artifact.display(), "Upgrades file lists no upgrades");
            remove_stale_report(report_path)?;
            return Ok(AggregateOutcome::NoUpgrades {
                artifact: artifact.to_path_buf(),
            });
        }

        let report = self.aggregate(&records).await;
        std::fs::write(report_path, report.render()).map_err(|source| {
            ChangelogError::WriteReport {
                path: report_path.to_path_buf(),
                source,
            }
        })?;
        info!(
            report = %report_path.display(),
            entries = report.len(),
            "Wrote changelog report"
        );

        Ok(AggregateOutcome::Written {
            report: report_path.to_path_buf(),
            entries: report.entries,
        })
    }
}

fn remove_stale_report(report_path: &Path) -> Result<(), ChangelogError> {
    match std::fs::remove_file(report_path) {
        Ok(()) => {
            info!(report = %report_path.display(), "Removed stale changelog report");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ChangelogError::WriteReport {
            path: report_path.to_path_buf(),
            source,
        }),
    }
}
