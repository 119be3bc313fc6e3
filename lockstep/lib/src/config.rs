//! Configuration for the reconciliation pipeline.
//!
//! Every value has a built-in default, so an empty (or absent) `lockstep.toml`
//! reproduces the stock behavior: Rails migrations under `db/migrate`, a
//! Bundler `Gemfile`/`Gemfile.lock` pair, GitHub releases and RubyGems metadata.
//!
//! ## Examples
//!
//! ```
//! use lockstep_lib::config::LockstepConfig;
//!
//! let config = LockstepConfig::from_toml_str(r#"
//! [changelog]
//! namespaces = ["rails", "rack"]
//! timeout_secs = 5
//! "#).unwrap();
//!
//! assert_eq!(config.changelog.namespaces, vec!["rails", "rack"]);
//! assert_eq!(config.migrations.dir.to_str(), Some("db/migrate"));
//! ```

use crate::manifest::rules::{RuleSpec, default_rules};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lockstep.toml";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockstepConfig {
    pub migrations: MigrationsConfig,
    pub manifest: ManifestConfig,
    pub lockfile: LockfileConfig,
    pub changelog: ChangelogConfig,
}

impl LockstepConfig {
    /// Parse configuration from TOML text.
    ///
    /// ## Errors
    ///
    /// Returns `ConfigError::Parse` when the text is not valid for this schema.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from an explicitly named file.
    ///
    /// ## Errors
    ///
    /// Returns `ConfigError::Read` if the file is missing or unreadable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load configuration if the file exists, falling back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }
}

/// `[migrations]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory holding migration definition files
    pub dir: PathBuf,
    /// File extension of migration files (without the dot)
    pub extension: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("db/migrate"),
            extension: "rb".to_string(),
        }
    }
}

/// `[manifest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub path: PathBuf,
    /// Ordered relaxation rules, applied top to bottom
    pub rules: Vec<RuleSpec>,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("Gemfile"),
            rules: default_rules(),
        }
    }
}

/// `[lockfile]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockfileConfig {
    /// Lockfile snapshot from before the update
    pub old: PathBuf,
    /// Lockfile snapshot after the update
    pub new: PathBuf,
    /// Where the `name|old|new` upgrade artifact is written
    pub artifact: PathBuf,
}

impl Default for LockfileConfig {
    fn default() -> Self {
        Self {
            old: PathBuf::from("old_gemfile.lock"),
            new: PathBuf::from("Gemfile.lock"),
            artifact: PathBuf::from("upgrades.txt"),
        }
    }
}

/// `[changelog]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangelogConfig {
    /// Where the aggregated report is written
    pub report: PathBuf,
    /// Base URL of the release-listing API
    pub api_base: String,
    /// Base URL of the package registry (metadata API and gem pages)
    pub registry_base: String,
    /// Organizational namespaces guessed for a dependency's repository
    pub namespaces: Vec<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Releases requested per listing
    pub per_page: u32,
    pub user_agent: String,
    /// Bearer token for the release-listing API
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl ChangelogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            report: PathBuf::from("changelogs.txt"),
            api_base: "https://api.github.com".to_string(),
            registry_base: "https://rubygems.org".to_string(),
            namespaces: vec!["rails".to_string()],
            timeout_secs: 10,
            per_page: 100,
            user_agent: "lockstep".to_string(),
            token: None,
        }
    }
}
