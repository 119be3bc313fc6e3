//! Line grammar for lockfile snapshots.
//!
//! A resolved dependency sits at exactly four columns of indentation:
//!
//! ```text
//!     name (version[, extra constraint tokens])
//! ```
//!
//! Only the first comma-separated token inside the parentheses is the version.
//! Deeper-indented lines (a dependency's own requirements) and section headers
//! do not match.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::trace;

static DEPENDENCY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s{4}(\S+)\s+\(([^)]+)\)").expect("dependency line pattern is valid")
});

/// A line outside the dependency grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("not a `    name (version)` dependency line")]
    Unrecognized,
}

/// A recognized dependency line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyLine<'a> {
    pub name: &'a str,
    pub version: &'a str,
}

/// Parse one lockfile line.
///
/// ## Errors
///
/// Returns `LineError::Unrecognized` for any line that is not a dependency line.
///
/// ## Examples
///
/// ```
/// use lockstep_lib::lockfile::grammar::parse_line;
///
/// let line = parse_line("    nokogiri (1.16.0-x86_64-linux, >= 1.0)").unwrap();
/// assert_eq!(line.name, "nokogiri");
/// assert_eq!(line.version, "1.16.0-x86_64-linux");
///
/// assert!(parse_line("GEM").is_err());
/// ```
pub fn parse_line(line: &str) -> Result<DependencyLine<'_>, LineError> {
    let captures = DEPENDENCY_LINE
        .captures(line)
        .ok_or(LineError::Unrecognized)?;

    let (Some(name), Some(inner)) = (captures.get(1), captures.get(2)) else {
        return Err(LineError::Unrecognized);
    };
    let inner = inner.as_str();
    let version = inner.split(',').next().unwrap_or(inner).trim();

    Ok(DependencyLine {
        name: name.as_str(),
        version,
    })
}

/// Resolved versions from one lockfile, keyed by dependency name.
///
/// Iteration follows the order names were first encountered. A name seen twice
/// keeps its first position and takes the later version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSnapshot {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl VersionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse lockfile text, discarding the count of unrecognized lines.
    pub fn from_lockfile(text: &str) -> Self {
        parse_snapshot(text).snapshot
    }

    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) {
        let name = name.into();
        let version = version.into();
        match self.index.get(&name) {
            Some(&position) => self.entries[position].1 = version,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, version));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&position| self.entries[position].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for VersionSnapshot {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (name, version) in iter {
            snapshot.insert(name, version);
        }
        snapshot
    }
}

/// A snapshot together with how much of the input it covered.
#[derive(Debug, Clone, Default)]
pub struct SnapshotParse {
    pub snapshot: VersionSnapshot,
    /// Lines outside the dependency grammar (including blank lines)
    pub unrecognized: usize,
}

/// Parse lockfile text into a snapshot.
pub fn parse_snapshot(text: &str) -> SnapshotParse {
    let mut parsed = SnapshotParse::default();

    for (number, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(dep) => parsed.snapshot.insert(dep.name, dep.version),
            Err(_) => {
                trace!(line = number + 1, "Skipping non-dependency lockfile line");
                parsed.unrecognized += 1;
            }
        }
    }

    parsed
}
