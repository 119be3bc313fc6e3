//! Duplicate migration detection and removal.
//!
//! Two dependency-bot branches that each add a migration with the same class
//! name leave the framework refusing to boot. The resolver scans the migration
//! directory in timestamp order, groups files by declared identifier and deletes
//! every file but the most recently modified one.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use lockstep_lib::migrations::{MigrationConflictResolver, MigrationOutcome};
//!
//! let outcome = MigrationConflictResolver::new("db/migrate").run().unwrap();
//! if let MigrationOutcome::Fixed { resolutions, .. } = &outcome {
//!     for r in resolutions {
//!         println!("removed {}", r.removed.display());
//!     }
//! }
//! ```

use super::grammar::parse_declaration;
use super::types::{DuplicateGroup, MigrationDefinition, MigrationError, MigrationOutcome};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Migration files found in a directory.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    /// Recognized definitions in lexical file-name order
    pub definitions: Vec<MigrationDefinition>,
    /// Files with the right extension but no migration declaration
    pub unrecognized: Vec<PathBuf>,
}

/// Scans a migration directory and removes stale duplicates.
#[derive(Debug, Clone)]
pub struct MigrationConflictResolver {
    dir: PathBuf,
    extension: String,
    dry_run: bool,
}

impl MigrationConflictResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "rb".to_string(),
            dry_run: false,
        }
    }

    /// Only consider files with this extension (without the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Plan resolutions without deleting anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read every migration file in the directory.
    ///
    /// Returns `Ok(None)` when the directory does not exist.
    ///
    /// ## Errors
    ///
    /// Returns `MigrationError` if the directory or a file in it cannot be read.
    pub fn scan(&self) -> Result<Option<Scan>, MigrationError> {
        if !self.dir.is_dir() {
            return Ok(None);
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|source| MigrationError::ReadDir {
            path: self.dir.clone(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MigrationError::ReadDir {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
            {
                paths.push(path);
            }
        }
        // File names carry a timestamp prefix, so lexical order is creation order
        paths.sort();

        let mut scan = Scan::default();
        for path in paths {
            let bytes = std::fs::read(&path).map_err(|source| MigrationError::ReadFile {
                path: path.clone(),
                source,
            })?;
            let content = match String::from_utf8(bytes) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping migration file that is not UTF-8");
                    scan.unrecognized.push(path);
                    continue;
                }
            };

            match parse_declaration(&content) {
                Ok(decl) => {
                    let modified = std::fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .map_err(|source| MigrationError::ReadFile {
                            path: path.clone(),
                            source,
                        })?;
                    scan.definitions.push(MigrationDefinition::new(
                        decl.identifier,
                        path,
                        DateTime::<Utc>::from(modified),
                    ));
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unrecognized migration file");
                    scan.unrecognized.push(path);
                }
            }
        }

        Ok(Some(scan))
    }

    /// Scan, resolve and (unless this is a dry run) delete losing duplicates.
    ///
    /// Deletions are not rolled back if a later deletion fails.
    ///
    /// ## Errors
    ///
    /// Returns `MigrationError` on any filesystem failure.
    pub fn run(&self) -> Result<MigrationOutcome, MigrationError> {
        let Some(scan) = self.scan()? else {
            info!(dir = %self.dir.display(), "No migrations directory found");
            return Ok(MigrationOutcome::NoDirectory {
                dir: self.dir.clone(),
            });
        };

        let groups = detect_duplicates(&scan.definitions);
        if groups.is_empty() {
            info!(scanned = scan.definitions.len(), "No duplicate migrations found");
            return Ok(MigrationOutcome::Clean {
                scanned: scan.definitions.len(),
                unrecognized: scan.unrecognized,
            });
        }

        warn!(count = groups.len(), "Found duplicate migrations");

        let mut resolutions = Vec::with_capacity(groups.len());
        for group in &groups {
            let resolution = group.resolve();
            if resolution.tie {
                warn!(
                    identifier = %resolution.identifier,
                    kept = %resolution.kept.display(),
                    "Duplicate migrations have identical modification times; keeping the first"
                );
            }
            info!(
                identifier = %resolution.identifier,
                removed = %resolution.removed.display(),
                kept = %resolution.kept.display(),
                dry_run = self.dry_run,
                "Resolving duplicate migration"
            );

            if !self.dry_run {
                std::fs::remove_file(&resolution.removed).map_err(|source| {
                    MigrationError::Remove {
                        path: resolution.removed.clone(),
                        source,
                    }
                })?;
            }
            resolutions.push(resolution);
        }

        Ok(MigrationOutcome::Fixed {
            resolutions,
            unrecognized: scan.unrecognized,
            dry_run: self.dry_run,
        })
    }
}

/// Pair every repeated identifier with the file currently holding it.
///
/// The holder of an identifier is whichever file survived the previous
/// comparison, so an identifier declared N times yields N-1 groups and the
/// survivor of the chain is the newest file.
pub fn detect_duplicates(definitions: &[MigrationDefinition]) -> Vec<DuplicateGroup> {
    let mut holders: HashMap<&str, &MigrationDefinition> = HashMap::new();
    let mut groups = Vec::new();

    for definition in definitions {
        match holders.get(definition.identifier.as_str()) {
            Some(existing) => {
                let group = DuplicateGroup {
                    identifier: definition.identifier.clone(),
                    existing: (*existing).clone(),
                    new: definition.clone(),
                };
                if group.resolve().kept == definition.path {
                    holders.insert(definition.identifier.as_str(), definition);
                }
                groups.push(group);
            }
            None => {
                holders.insert(definition.identifier.as_str(), definition);
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const CREATE_LINKS: &str =
        "class CreateLinks < ActiveRecord::Migration[7.0]\n  def change\n  end\nend\n";
    const ADD_COLUMNS: &str =
        "class AddColumnsToLinks < ActiveRecord::Migration[7.0]\n  def change\n  end\nend\n";

    fn write_migration(dir: &Path, name: &str, content: &str, age_secs: u64) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 - age_secs);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    fn migration_dir() -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("db/migrate");
        std::fs::create_dir_all(&dir).unwrap();
        (temp, dir)
    }

    #[test]
    fn test_missing_directory_is_noop() {
        let temp = TempDir::new().unwrap();
        let outcome = MigrationConflictResolver::new(temp.path().join("db/migrate"))
            .run()
            .unwrap();
        assert!(matches!(outcome, MigrationOutcome::NoDirectory { .. }));
    }

    #[test]
    fn test_clean_directory() {
        let (_temp, dir) = migration_dir();
        write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 10);
        write_migration(&dir, "20240316083143_add_columns.rb", ADD_COLUMNS, 5);

        let outcome = MigrationConflictResolver::new(&dir).run().unwrap();
        assert_eq!(
            outcome,
            MigrationOutcome::Clean {
                scanned: 2,
                unrecognized: vec![]
            }
        );
    }

    #[test]
    fn test_newer_duplicate_survives() {
        let (_temp, dir) = migration_dir();
        let older = write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 100);
        let newer = write_migration(&dir, "20231107000123_create_links.rb", CREATE_LINKS, 10);

        let outcome = MigrationConflictResolver::new(&dir).run().unwrap();

        assert!(outcome.has_changes());
        assert_eq!(outcome.removed(), vec![older.as_path()]);
        assert!(!older.exists());
        assert!(newer.exists());
    }

    #[test]
    fn test_older_new_file_is_removed() {
        let (_temp, dir) = migration_dir();
        let first = write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 10);
        let second = write_migration(&dir, "20231107000123_create_links.rb", CREATE_LINKS, 100);

        MigrationConflictResolver::new(&dir).run().unwrap();

        assert!(first.exists());
        assert!(!second.exists());
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_equal_timestamps_keep_first_seen() {
        let (_temp, dir) = migration_dir();
        let first = write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 50);
        let second = write_migration(&dir, "20231107000123_create_links.rb", CREATE_LINKS, 50);

        let outcome = MigrationConflictResolver::new(&dir).run().unwrap();

        assert!(first.exists());
        assert!(!second.exists());
        match outcome {
            MigrationOutcome::Fixed { resolutions, .. } => assert!(resolutions[0].tie),
            other => panic!("expected Fixed, got {:?}", other),
        }
        assert!(logs_contain("identical modification times"));
    }

    #[test]
    fn test_three_way_duplicate_keeps_newest() {
        let (_temp, dir) = migration_dir();
        let a = write_migration(&dir, "20230101000000_create_links.rb", CREATE_LINKS, 20);
        let b = write_migration(&dir, "20230201000000_create_links.rb", CREATE_LINKS, 5);
        let c = write_migration(&dir, "20230301000000_create_links.rb", CREATE_LINKS, 30);

        let outcome = MigrationConflictResolver::new(&dir).run().unwrap();

        assert_eq!(outcome.removed().len(), 2);
        assert!(!a.exists());
        assert!(b.exists());
        assert!(!c.exists());
    }

    #[test]
    fn test_non_utf8_file_is_skipped() {
        let (_temp, dir) = migration_dir();
        let first = write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 100);
        let second = write_migration(&dir, "20231107000123_create_links.rb", CREATE_LINKS, 10);
        let blob = dir.join("20231201000000_blob.rb");
        std::fs::write(&blob, [0xff, 0xfe, 0x00]).unwrap();

        let outcome = MigrationConflictResolver::new(&dir).run().unwrap();

        match outcome {
            MigrationOutcome::Fixed { unrecognized, .. } => assert_eq!(unrecognized, vec![blob.clone()]),
            other => panic!("expected Fixed, got {:?}", other),
        }
        assert!(!first.exists());
        assert!(second.exists());
        assert!(blob.exists());
    }

    #[test]
    fn test_second_run_is_noop() {
        let (_temp, dir) = migration_dir();
        write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 100);
        write_migration(&dir, "20231107000123_create_links.rb", CREATE_LINKS, 10);

        let resolver = MigrationConflictResolver::new(&dir);
        assert!(resolver.run().unwrap().has_changes());

        let second = resolver.run().unwrap();
        assert!(matches!(second, MigrationOutcome::Clean { scanned: 1, .. }));
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let (_temp, dir) = migration_dir();
        let older = write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 100);
        write_migration(&dir, "20231107000123_create_links.rb", CREATE_LINKS, 10);

        let outcome = MigrationConflictResolver::new(&dir)
            .dry_run(true)
            .run()
            .unwrap();

        assert!(!outcome.has_changes());
        assert_eq!(outcome.removed(), vec![older.as_path()]);
        assert!(older.exists());
    }

    #[test]
    fn test_unrecognized_and_foreign_files() {
        let (_temp, dir) = migration_dir();
        write_migration(&dir, "20231028123456_create_links.rb", CREATE_LINKS, 10);
        let helper = write_migration(&dir, "20231029000000_helper.rb", "module Helper\nend\n", 10);
        write_migration(&dir, "README.md", CREATE_LINKS, 10);

        let scan = MigrationConflictResolver::new(&dir).scan().unwrap().unwrap();

        assert_eq!(scan.definitions.len(), 1);
        assert_eq!(scan.definitions[0].ordering_key, "20231028123456");
        assert_eq!(scan.unrecognized, vec![helper]);
    }

    #[test]
    fn test_custom_extension() {
        let (_temp, dir) = migration_dir();
        write_migration(&dir, "1_create_links.migration", CREATE_LINKS, 100);
        write_migration(&dir, "2_create_links.migration", CREATE_LINKS, 10);

        let outcome = MigrationConflictResolver::new(&dir)
            .with_extension("migration")
            .dry_run(true)
            .run()
            .unwrap();
        assert_eq!(outcome.removed().len(), 1);
    }

    #[test]
    fn test_detect_duplicates_is_pure() {
        let (_temp, dir) = migration_dir();
        write_migration(&dir, "1_create_links.rb", CREATE_LINKS, 100);
        write_migration(&dir, "2_create_links.rb", CREATE_LINKS, 10);
        write_migration(&dir, "3_add_columns.rb", ADD_COLUMNS, 10);

        let scan = MigrationConflictResolver::new(&dir).scan().unwrap().unwrap();
        let groups = detect_duplicates(&scan.definitions);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].identifier, "CreateLinks");
        assert_eq!(scan.definitions.len(), 3);
    }
}
