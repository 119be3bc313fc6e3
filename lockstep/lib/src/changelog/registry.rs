//! RubyGems metadata provider.
//!
//! Queries `/api/v1/gems/{name}.json` and reports the gem's `changelog_uri`,
//! falling back to `source_code_uri`.

use super::types::{ChangelogError, ChangelogSource, ReleaseNotes};
use crate::config::ChangelogConfig;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

/// The subset of the gem metadata response that is used.
#[derive(Debug, Deserialize)]
struct GemMetadata {
    changelog_uri: Option<String>,
    source_code_uri: Option<String>,
}

/// Registry metadata client.
#[derive(Debug, Clone)]
pub struct RubyGemsRegistry {
    client: HttpClient,
    base_url: String,
    timeout: Duration,
}

impl RubyGemsRegistry {
    pub fn new(client: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_config(client: HttpClient, config: &ChangelogConfig) -> Self {
        Self::new(client, config.registry_base.as_str()).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-facing registry page for a gem.
    ///
    /// ```
    /// use lockstep_lib::changelog::registry::RubyGemsRegistry;
    ///
    /// let registry = RubyGemsRegistry::new(reqwest::Client::new(), "https://rubygems.org/");
    /// assert_eq!(registry.page_url("rack"), "https://rubygems.org/gems/rack");
    /// ```
    pub fn page_url(&self, gem: &str) -> String {
        format!("{}/gems/{}", self.base_url, gem)
    }

    /// Look up the changelog (or source code) URL of a gem.
    ///
    /// Returns `Ok(None)` when the gem exists but declares neither URL.
    ///
    /// ## Errors
    ///
    /// - `ChangelogError::Status` - non-success status (e.g. unknown gem)
    /// - `ChangelogError::Http` - transport, timeout or JSON decoding failure
    pub async fn changelog_url(&self, gem: &str) -> Result<Option<String>, ChangelogError> {
        let url = format!("{}/api/v1/gems/{}.json", self.base_url, gem);

        let response = self.client.get(&url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(ChangelogError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let metadata: GemMetadata = response.json().await?;
        let non_empty = |uri: Option<String>| uri.filter(|u| !u.trim().is_empty());

        Ok(non_empty(metadata.changelog_uri).or_else(|| non_empty(metadata.source_code_uri)))
    }

    /// Registry metadata as release notes.
    pub async fn notes_for(&self, gem: &str) -> Result<Option<ReleaseNotes>, ChangelogError> {
        Ok(self.changelog_url(gem).await?.map(|url| ReleaseNotes {
            source: ChangelogSource::RegistryMetadata,
            origin: Some("rubygems".to_string()),
            text_or_url: url,
        }))
    }
}
