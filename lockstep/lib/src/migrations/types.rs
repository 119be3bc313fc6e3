//! Core types for migration conflict detection.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for migration scanning and resolution.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Listing the migration directory failed
    #[error("Failed to read migration directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a migration file or its metadata failed
    #[error("Failed to read migration file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deleting the losing duplicate failed
    #[error("Failed to remove duplicate migration {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One migration file and its declared identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationDefinition {
    pub identifier: String,
    pub path: PathBuf,
    /// Timestamp prefix of the file name (lexically sortable)
    pub ordering_key: String,
    pub modified_at: DateTime<Utc>,
}

impl MigrationDefinition {
    pub fn new(identifier: impl Into<String>, path: PathBuf, modified_at: DateTime<Utc>) -> Self {
        let ordering_key = ordering_key(&path);
        Self {
            identifier: identifier.into(),
            path,
            ordering_key,
            modified_at,
        }
    }
}

/// Timestamp prefix of a migration file name: everything before the first `_`.
///
/// ```
/// use lockstep_lib::migrations::types::ordering_key;
/// use std::path::Path;
///
/// assert_eq!(ordering_key(Path::new("db/migrate/20231028123456_create_links.rb")), "20231028123456");
/// ```
pub fn ordering_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('_') {
        Some((prefix, _)) => prefix.to_string(),
        None => name,
    }
}

/// A second file declaring an identifier that is already held by another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub identifier: String,
    /// The file currently holding the identifier
    pub existing: MigrationDefinition,
    /// The later (in lexical order) file declaring the same identifier
    pub new: MigrationDefinition,
}

impl DuplicateGroup {
    /// Decide which file of the pair goes.
    ///
    /// The strictly older file is removed. When both timestamps are equal the
    /// `new` file is removed and `existing` survives.
    pub fn resolve(&self) -> Resolution {
        let (removed, kept) = if self.existing.modified_at < self.new.modified_at {
            (&self.existing, &self.new)
        } else {
            (&self.new, &self.existing)
        };

        Resolution {
            identifier: self.identifier.clone(),
            removed: removed.path.clone(),
            kept: kept.path.clone(),
            tie: self.existing.modified_at == self.new.modified_at,
        }
    }
}

/// The decision taken for one duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub identifier: String,
    pub removed: PathBuf,
    pub kept: PathBuf,
    /// Both files had identical modification times
    pub tie: bool,
}

/// Result of a resolver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// The migration directory does not exist
    NoDirectory { dir: PathBuf },
    /// No identifier is declared twice
    Clean {
        scanned: usize,
        unrecognized: Vec<PathBuf>,
    },
    /// Duplicates were found and the losing files removed
    Fixed {
        resolutions: Vec<Resolution>,
        unrecognized: Vec<PathBuf>,
        /// Nothing was deleted; `resolutions` is the plan
        dry_run: bool,
    },
}

impl MigrationOutcome {
    /// Paths removed (or, on a dry run, that would be removed).
    pub fn removed(&self) -> Vec<&Path> {
        match self {
            MigrationOutcome::Fixed { resolutions, .. } => {
                resolutions.iter().map(|r| r.removed.as_path()).collect()
            }
            _ => vec![],
        }
    }

    /// Whether the run changed files the caller should commit.
    pub fn has_changes(&self) -> bool {
        matches!(self, MigrationOutcome::Fixed { dry_run: false, .. })
    }
}
