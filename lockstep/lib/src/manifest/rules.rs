//! Relaxation rules: ordered `(pattern, replacement)` pairs.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

/// Error types for constraint relaxation.
#[derive(Debug, Error)]
pub enum RelaxError {
    /// A configured rule pattern is not a valid regular expression
    #[error("Invalid pattern for relaxation rule '{name}': {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    /// The manifest could not be read
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The relaxed manifest could not be written back
    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A rule as written in configuration.
///
/// `replacement` follows `regex` replacement syntax, so `$1`/`${name}` refer
/// to capture groups in `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
    pub replacement: String,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// The built-in rule table.
///
/// 1. `gem "sqlite3", "~> 1.4"` becomes `gem "sqlite3", ">= 1.4"`
/// 2. `ruby "3.2.0"` becomes `ruby "~> 3.2"`
pub fn default_rules() -> Vec<RuleSpec> {
    vec![
        RuleSpec::new(
            "sqlite3-compatible-release",
            r#"gem\s+['"]sqlite3['"]\s*,\s*['"]~>\s*1\.4['"]"#,
            r#"gem "sqlite3", ">= 1.4""#,
        ),
        RuleSpec::new(
            "ruby-exact-pin",
            r#"ruby\s+['"]3\.2\.0['"]"#,
            r#"ruby "~> 3.2""#,
        ),
    ]
}

/// A compiled relaxation rule.
#[derive(Debug, Clone)]
pub struct RelaxationRule {
    name: String,
    pattern: Regex,
    replacement: String,
}

impl RelaxationRule {
    /// Compile a configured rule.
    ///
    /// ## Errors
    ///
    /// Returns `RelaxError::InvalidPattern` naming the rule if the pattern does not compile.
    pub fn compile(spec: &RuleSpec) -> Result<Self, RelaxError> {
        let pattern = Regex::new(&spec.pattern).map_err(|source| RelaxError::InvalidPattern {
            name: spec.name.clone(),
            source,
        })?;
        Ok(Self {
            name: spec.name.clone(),
            pattern,
            replacement: spec.replacement.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace every match of the pattern.
    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

/// An ordered table of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<RelaxationRule>,
}

impl RuleTable {
    /// Compile rules, preserving order.
    ///
    /// ## Errors
    ///
    /// Fails on the first rule whose pattern does not compile.
    pub fn compile(specs: &[RuleSpec]) -> Result<Self, RelaxError> {
        let rules = specs
            .iter()
            .map(RelaxationRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// The built-in table from [`default_rules`].
    pub fn builtin() -> Self {
        let rules = default_rules()
            .iter()
            .filter_map(|spec| RelaxationRule::compile(spec).ok())
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[RelaxationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
