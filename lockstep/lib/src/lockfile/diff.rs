//! Version diff between two lockfile snapshots.

use super::artifact::write_artifact;
use super::grammar::{VersionSnapshot, parse_snapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Error types for lockfile diffing and the upgrade artifact.
#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One dependency whose resolved version changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpgradeRecord {
    pub dependency: String,
    pub old_version: String,
    pub new_version: String,
}

impl UpgradeRecord {
    pub fn new(
        dependency: impl Into<String>,
        old_version: impl Into<String>,
        new_version: impl Into<String>,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            old_version: old_version.into(),
            new_version: new_version.into(),
        }
    }
}

impl fmt::Display for UpgradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} → {}",
            self.dependency, self.old_version, self.new_version
        )
    }
}

/// Dependencies present in both snapshots with different versions.
///
/// Records follow the order of `new`. Names present in only one snapshot
/// never produce a record.
///
/// ## Examples
///
/// ```
/// use lockstep_lib::lockfile::{VersionSnapshot, UpgradeRecord, diff};
///
/// let old: VersionSnapshot = [("foo", "1.0"), ("bar", "2.0")].into_iter().collect();
/// let new: VersionSnapshot = [("foo", "1.2"), ("bar", "2.0")].into_iter().collect();
///
/// assert_eq!(diff(&old, &new), vec![UpgradeRecord::new("foo", "1.0", "1.2")]);
/// ```
pub fn diff(old: &VersionSnapshot, new: &VersionSnapshot) -> Vec<UpgradeRecord> {
    new.iter()
        .filter_map(|(name, new_version)| {
            let old_version = old.get(name)?;
            (old_version != new_version)
                .then(|| UpgradeRecord::new(name, old_version, new_version))
        })
        .collect()
}

/// Markdown summary of an upgrade set.
pub fn render_summary(records: &[UpgradeRecord]) -> String {
    let mut out = String::from("## Dependency Upgrades Detected:\n");
    if records.is_empty() {
        out.push_str("No version changes detected\n");
    } else {
        for record in records {
            out.push_str(&format!("- {}\n", record));
        }
    }
    out
}

/// Result of a differ run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffOutcome {
    pub records: Vec<UpgradeRecord>,
    /// Where the machine-readable artifact was written
    pub artifact: PathBuf,
    /// Lines of the old/new lockfile outside the dependency grammar
    pub unrecognized_old: usize,
    pub unrecognized_new: usize,
}

/// Diffs two lockfiles on disk and persists the upgrade artifact.
#[derive(Debug, Clone)]
pub struct UpgradeDiffer {
    old: PathBuf,
    new: PathBuf,
    artifact: PathBuf,
}

impl UpgradeDiffer {
    pub fn new(
        old: impl Into<PathBuf>,
        new: impl Into<PathBuf>,
        artifact: impl Into<PathBuf>,
    ) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            artifact: artifact.into(),
        }
    }

    /// Read both lockfiles, diff them and write the artifact.
    ///
    /// The artifact is always written, so an empty upgrade set leaves an empty file.
    ///
    /// ## Errors
    ///
    /// Returns `LockfileError` if either lockfile is unreadable or the artifact
    /// cannot be written.
    pub fn run(&self) -> Result<DiffOutcome, LockfileError> {
        let old = parse_snapshot(&read(&self.old)?);
        let new = parse_snapshot(&read(&self.new)?);
        debug!(
            old_dependencies = old.snapshot.len(),
            new_dependencies = new.snapshot.len(),
            "Parsed lockfile snapshots"
        );

        let records = diff(&old.snapshot, &new.snapshot);
        write_artifact(&self.artifact, &records)?;
        info!(
            upgrades = records.len(),
            artifact = %self.artifact.display(),
            "Wrote upgrade artifact"
        );

        Ok(DiffOutcome {
            records,
            artifact: self.artifact.clone(),
            unrecognized_old: old.unrecognized,
            unrecognized_new: new.unrecognized,
        })
    }
}

fn read(path: &Path) -> Result<String, LockfileError> {
    std::fs::read_to_string(path).map_err(|source| LockfileError::Read {
        path: path.to_path_buf(),
        source,
    })
}
