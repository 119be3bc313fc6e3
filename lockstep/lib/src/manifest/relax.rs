//! Manifest rewriting.
//!
//! Widening is plain text substitution: the lockfile already holds a valid
//! resolution and the manifest only has to stop contradicting it. No dependency
//! graph is built and no constraint is checked for satisfiability.

use super::rules::{RelaxError, RuleTable};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Text after applying a rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relaxation {
    pub text: String,
    /// Names of the rules that changed the text, in table order
    pub applied: Vec<String>,
}

impl Relaxation {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

impl RuleTable {
    /// Apply every rule in order to `text`.
    ///
    /// ## Examples
    ///
    /// ```
    /// use lockstep_lib::manifest::RuleTable;
    ///
    /// let relaxed = RuleTable::builtin().relax("ruby '3.2.0'\ngem 'sqlite3', '~> 1.4'\n");
    /// assert_eq!(relaxed.text, "ruby \"~> 3.2\"\ngem \"sqlite3\", \">= 1.4\"\n");
    /// assert_eq!(relaxed.applied.len(), 2);
    /// ```
    pub fn relax(&self, text: &str) -> Relaxation {
        let mut current = text.to_string();
        let mut applied = Vec::new();

        for rule in self.rules() {
            let next = rule.apply(&current);
            if next != current {
                debug!(rule = rule.name(), "Relaxation rule matched");
                applied.push(rule.name().to_string());
                current = next.into_owned();
            }
        }

        Relaxation {
            text: current,
            applied,
        }
    }
}

/// Result of relaxing a manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelaxOutcome {
    /// No rule changed the manifest; nothing was written
    Unchanged { manifest: PathBuf },
    /// The manifest was rewritten
    Rewritten {
        manifest: PathBuf,
        applied: Vec<String>,
    },
}

/// Rewrites a manifest so its constraints accept the locked versions.
#[derive(Debug, Clone)]
pub struct ConstraintRelaxer {
    manifest: PathBuf,
    rules: RuleTable,
}

impl ConstraintRelaxer {
    pub fn new(manifest: impl Into<PathBuf>, rules: RuleTable) -> Self {
        Self {
            manifest: manifest.into(),
            rules,
        }
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    /// Relax the manifest in place. The file is written only if its text changed.
    ///
    /// ## Errors
    ///
    /// Returns `RelaxError::Read` / `RelaxError::Write` on I/O failure.
    pub fn run(&self) -> Result<RelaxOutcome, RelaxError> {
        let original =
            std::fs::read_to_string(&self.manifest).map_err(|source| RelaxError::Read {
                path: self.manifest.clone(),
                source,
            })?;

        let relaxed = self.rules.relax(&original);
        if relaxed.text == original {
            info!(manifest = %self.manifest.display(), "No manifest constraints needed relaxing");
            return Ok(RelaxOutcome::Unchanged {
                manifest: self.manifest.clone(),
            });
        }

        std::fs::write(&self.manifest, &relaxed.text).map_err(|source| RelaxError::Write {
            path: self.manifest.clone(),
            source,
        })?;
        info!(
            manifest = %self.manifest.display(),
            rules = ?relaxed.applied,
            "Relaxed manifest constraints"
        );

        Ok(RelaxOutcome::Rewritten {
            manifest: self.manifest.clone(),
            applied: relaxed.applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::rules::RuleSpec;
    use tempfile::TempDir;

    const GEMFILE: &str = r#"source "https://rubygems.org"

ruby "3.2.0"

gem "rails", "~> 8.0"
gem 'sqlite3', '~> 1.4'
gem "puma", ">= 5.0"
"#;

    #[test]
    fn test_relax_text() {
        let relaxed = RuleTable::builtin().relax(GEMFILE);

        assert!(relaxed.changed());
        assert_eq!(
            relaxed.applied,
            vec!["sqlite3-compatible-release", "ruby-exact-pin"]
        );
        assert!(relaxed.text.contains(r#"gem "sqlite3", ">= 1.4""#));
        assert!(relaxed.text.contains(r#"ruby "~> 3.2""#));
        assert!(relaxed.text.contains(r#"gem "rails", "~> 8.0""#));
    }

    #[test]
    fn test_rules_apply_in_order() {
        let table = RuleTable::compile(&[
            RuleSpec::new("first", "1.4", "1.5"),
            RuleSpec::new("second", "1.5", "2.0"),
        ])
        .unwrap();
        let relaxed = table.relax("gem 'x', '1.4'");
        assert_eq!(relaxed.text, "gem 'x', '2.0'");
        assert_eq!(relaxed.applied, vec!["first", "second"]);
    }

    #[test]
    fn test_run_rewrites_conflicting_pin() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("Gemfile");
        std::fs::write(&manifest, GEMFILE).unwrap();

        let outcome = ConstraintRelaxer::new(&manifest, RuleTable::builtin())
            .run()
            .unwrap();

        assert!(matches!(outcome, RelaxOutcome::Rewritten { ref applied, .. } if applied.len() == 2));
        let written = std::fs::read_to_string(&manifest).unwrap();
        assert!(written.contains(r#"gem "sqlite3", ">= 1.4""#));
        assert!(!written.contains("~> 1.4"));
    }

    #[test]
    fn test_run_leaves_clean_manifest_byte_identical() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("Gemfile");
        let clean = "source 'https://rubygems.org'\r\ngem 'sqlite3', '>= 2.0'\r\n";
        std::fs::write(&manifest, clean).unwrap();
        let before = std::fs::metadata(&manifest).unwrap().modified().unwrap();

        let outcome = ConstraintRelaxer::new(&manifest, RuleTable::builtin())
            .run()
            .unwrap();

        assert!(matches!(outcome, RelaxOutcome::Unchanged { .. }));
        assert_eq!(std::fs::read(&manifest).unwrap(), clean.as_bytes());
        assert_eq!(
            std::fs::metadata(&manifest).unwrap().modified().unwrap(),
            before
        );
    }

    #[test]
    fn test_run_missing_manifest() {
        let temp = TempDir::new().unwrap();
        let result = ConstraintRelaxer::new(temp.path().join("Gemfile"), RuleTable::builtin()).run();
        assert!(matches!(result, Err(RelaxError::Read { .. })));
    }

    #[test]
    fn test_empty_table_changes_nothing() {
        let relaxed = RuleTable::default().relax(GEMFILE);
        assert!(!relaxed.changed());
        assert_eq!(relaxed.text, GEMFILE);
    }
}
