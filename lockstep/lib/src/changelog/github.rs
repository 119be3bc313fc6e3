//! GitHub Releases API provider.
//!
//! For each candidate repository of a dependency, the release listing is
//! fetched and filtered to the releases between the old and new version.
//! The first candidate with matching releases wins. A candidate that errors
//! (transport failure, timeout, non-success status, rate limit) is logged and
//! skipped; there is no retry.
//!
//! ## Version filtering
//!
//! Tags are compared as plain strings after stripping a leading `v`, so
//! `"1.10.0" < "1.9.0"` and pre-release ordering is not semver-aware.

use super::candidates::candidate_repositories;
use super::types::{ChangelogError, ChangelogSource, ReleaseNotes};
use crate::config::ChangelogConfig;
use crate::lockfile::UpgradeRecord;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// GitHub API response for a single release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GitHubRelease {
    /// Tag name (e.g., "v1.2.3")
    pub tag_name: String,
    /// Release name
    pub name: Option<String>,
    /// Release body (markdown)
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

/// Strip one leading `v` from a release tag.
pub fn normalize_tag(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// Releases whose normalized tag lies lexically within `[old, new]`.
///
/// ## Examples
///
/// ```
/// use lockstep_lib::changelog::github::{GitHubRelease, releases_in_range};
///
/// let release = |tag: &str| GitHubRelease {
///     tag_name: tag.to_string(),
///     name: None,
///     body: None,
///     draft: false,
/// };
/// let releases = vec![release("v2.1.0"), release("v2.0.1"), release("v2.0.0"), release("v1.9.0")];
///
/// let tags: Vec<&str> = releases_in_range(&releases, "2.0.0", "2.0.1")
///     .iter()
///     .map(|r| r.tag_name.as_str())
///     .collect();
/// assert_eq!(tags, vec!["v2.0.1", "v2.0.0"]);
/// ```
pub fn releases_in_range<'a>(
    releases: &'a [GitHubRelease],
    old_version: &str,
    new_version: &str,
) -> Vec<&'a GitHubRelease> {
    releases
        .iter()
        .filter(|r| !r.draft)
        .filter(|r| {
            let tag = normalize_tag(&r.tag_name);
            tag >= old_version && tag <= new_version
        })
        .collect()
}

/// Render releases as `### heading` + body blocks.
pub fn format_releases(releases: &[&GitHubRelease]) -> String {
    releases
        .iter()
        .map(|r| {
            let heading = r
                .name
                .as_deref()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(&r.tag_name);
            format!("### {}\n{}", heading, r.body.as_deref().unwrap_or("").trim_end())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Release-listing client.
#[derive(Debug, Clone)]
pub struct GitHubReleases {
    client: Client,
    api_base: String,
    token: Option<String>,
    namespaces: Vec<String>,
    per_page: u32,
    timeout: Duration,
    user_agent: String,
}

impl GitHubReleases {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: None,
            namespaces: vec!["rails".to_string()],
            per_page: 100,
            timeout: Duration::from_secs(10),
            user_agent: "lockstep".to_string(),
        }
    }

    pub fn from_config(client: Client, config: &ChangelogConfig) -> Self {
        Self::new(client, config.api_base.as_str())
            .with_token(config.token.clone())
            .with_namespaces(config.namespaces.clone())
            .with_per_page(config.per_page)
            .with_timeout(config.timeout())
            .with_user_agent(config.user_agent.clone())
    }

    /// Bearer token sent as the `Authorization` header.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, 100);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Fetch the release listing of `owner/repo`.
    ///
    /// ## Errors
    ///
    /// - `ChangelogError::RateLimited` - HTTP 429, or a failure status with no remaining quota
    /// - `ChangelogError::Status` - any other non-success status
    /// - `ChangelogError::Http` - transport, timeout or JSON decoding failure
    pub async fn fetch_releases(&self, repo: &str) -> Result<Vec<GitHubRelease>, ChangelogError> {
        let url = format!(
            "{}/repos/{}/releases?per_page={}",
            self.api_base, repo, self.per_page
        );

        let mut request = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/vnd.github+json")
            .timeout(self.timeout);

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            if response.status().as_u16() == 429 {
                return Err(ChangelogError::RateLimited);
            }

            // A success that used the last request of the quota is still valid
            if let Some(remaining) = response.headers().get("X-RateLimit-Remaining")
                && let Ok(remaining_str) = remaining.to_str()
                && let Ok(remaining_count) = remaining_str.parse::<u32>()
                && remaining_count == 0
            {
                return Err(ChangelogError::RateLimited);
            }

            return Err(ChangelogError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    /// Try each candidate repository until one has releases in range.
    pub async fn notes_for(&self, record: &UpgradeRecord) -> Option<ReleaseNotes> {
        for repo in candidate_repositories(&record.dependency, &self.namespaces) {
            let releases = match self.fetch_releases(&repo).await {
                Ok(releases) => releases,
                Err(e) => {
                    debug!(repo = %repo, error = %e, "Candidate repository unavailable");
                    if matches!(e, ChangelogError::RateLimited) {
                        warn!(repo = %repo, "Release API rate limit reached");
                    }
                    continue;
                }
            };

            let relevant = releases_in_range(&releases, &record.old_version, &record.new_version);
            if relevant.is_empty() {
                debug!(repo = %repo, listed = releases.len(), "No releases in range");
                continue;
            }

            return Some(ReleaseNotes {
                source: ChangelogSource::ReleaseApi,
                origin: Some(repo),
                text_or_url: format_releases(&relevant),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn release(tag: &str, name: Option<&str>, body: &str) -> GitHubRelease {
        GitHubRelease {
            tag_name: tag.to_string(),
            name: name.map(str::to_string),
            body: Some(body.to_string()),
            draft: false,
        }
    }

    fn releases_json() -> serde_json::Value {
        serde_json::json!([
            {"tag_name": "v3.2.0", "name": "3.2.0", "body": "Big release", "draft": false},
            {"tag_name": "v3.1.8", "name": "Rack 3.1.8", "body": "Security fix", "draft": false},
            {"tag_name": "v3.1.7", "name": null, "body": "Bug fixes", "draft": false},
            {"tag_name": "v3.1.6", "name": "3.1.6", "body": "Older", "draft": false}
        ])
    }

    fn client_for(server: &MockServer) -> GitHubReleases {
        GitHubReleases::new(Client::new(), server.uri()).with_timeout(Duration::from_secs(2))
    }

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("v1.2.3"), "1.2.3");
        assert_eq!(normalize_tag("1.2.3"), "1.2.3");
        assert_eq!(normalize_tag("vv1"), "v1");
    }

    #[test]
    fn test_range_is_inclusive() {
        let releases = vec![
            release("v1.0.0", None, ""),
            release("v1.1.0", None, ""),
            release("v1.2.0", None, ""),
        ];
        assert_eq!(releases_in_range(&releases, "1.0.0", "1.1.0").len(), 2);
    }

    #[test]
    fn test_range_is_lexical() {
        // "1.10.0" sorts before "1.9.0" as a string
        let releases = vec![release("1.10.0", None, "")];
        assert!(releases_in_range(&releases, "1.9.0", "1.11.0").is_empty());
    }

    #[test]
    fn test_range_skips_drafts() {
        let mut draft = release("v1.1.0", None, "");
        draft.draft = true;
        assert!(releases_in_range(&[draft], "1.0.0", "2.0.0").is_empty());
    }

    #[test]
    fn test_format_uses_name_then_tag() {
        let a = release("v2.0.0", Some("Two"), "Body two\n");
        let b = release("v1.9.0", Some(""), "Body one");
        assert_eq!(
            format_releases(&[&a, &b]),
            "### Two\nBody two\n\n### v1.9.0\nBody one"
        );
    }

    #[tokio::test]
    async fn test_fetch_releases_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .and(header("Authorization", "Bearer s3cret"))
            .and(header("User-Agent", "lockstep"))
            .respond_with(ResponseTemplate::new(200).set_body_json(releases_json()))
            .expect(1)
            .mount(&server)
            .await;

        let releases = client_for(&server)
            .with_token(Some("s3cret".into()))
            .fetch_releases("rack/rack")
            .await
            .unwrap();
        assert_eq!(releases.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_releases_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_releases("rack/rack").await;
        assert!(matches!(result, Err(ChangelogError::RateLimited)));
    }

    #[tokio::test]
    async fn test_fetch_releases_forbidden_with_exhausted_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .respond_with(
                ResponseTemplate::new(403).insert_header("X-RateLimit-Remaining", "0"),
            )
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_releases("rack/rack").await;
        assert!(matches!(result, Err(ChangelogError::RateLimited)));
    }

    #[tokio::test]
    async fn test_last_request_of_quota_keeps_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([
                        {"tag_name": "v3.1.8", "name": null, "body": "Security fix", "draft": false}
                    ]))
                    .insert_header("X-RateLimit-Remaining", "0"),
            )
            .mount(&server)
            .await;
        let releases = client_for(&server);

        assert_eq!(releases.fetch_releases("rack/rack").await.unwrap().len(), 1);

        let notes = releases
            .notes_for(&UpgradeRecord::new("rack", "3.1.7", "3.1.8"))
            .await
            .unwrap();
        assert_eq!(notes.origin.as_deref(), Some("rack/rack"));
        assert_eq!(notes.text_or_url, "### v3.1.8\nSecurity fix");
    }

    #[tokio::test]
    async fn test_fetch_releases_forbidden_with_quota_left() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .respond_with(
                ResponseTemplate::new(403).insert_header("X-RateLimit-Remaining", "12"),
            )
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_releases("rack/rack").await;
        assert!(matches!(result, Err(ChangelogError::Status { status: 403, .. })));
    }

    #[tokio::test]
    async fn test_fetch_releases_not_found() {
        let server = MockServer::start().await;
        let result = client_for(&server).fetch_releases("nobody/nothing").await;
        assert!(matches!(result, Err(ChangelogError::Status { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_fetch_releases_malformed_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_releases("rack/rack").await;
        assert!(matches!(result, Err(ChangelogError::Http(_))));
    }

    #[tokio::test]
    async fn test_notes_for_falls_through_candidates() {
        let server = MockServer::start().await;
        // First candidate (rack/rack) is missing, namespace guess answers
        Mock::given(method("GET"))
            .and(path("/repos/rails/rack/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(releases_json()))
            .mount(&server)
            .await;

        let notes = client_for(&server)
            .notes_for(&UpgradeRecord::new("rack", "3.1.7", "3.1.8"))
            .await
            .unwrap();

        assert_eq!(notes.source, ChangelogSource::ReleaseApi);
        assert_eq!(notes.origin.as_deref(), Some("rails/rack"));
        assert_eq!(notes.text_or_url, "### Rack 3.1.8\nSecurity fix\n\n### v3.1.7\nBug fixes");
    }

    #[tokio::test]
    async fn test_notes_for_skips_candidate_without_matches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack/rack/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"tag_name": "v0.1.0", "name": null, "body": "Ancient", "draft": false}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/rails/rack/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(releases_json()))
            .mount(&server)
            .await;

        let notes = client_for(&server)
            .notes_for(&UpgradeRecord::new("rack", "3.1.8", "3.2.0"))
            .await
            .unwrap();
        assert_eq!(notes.origin.as_deref(), Some("rails/rack"));
    }

    #[tokio::test]
    async fn test_notes_for_tries_normalized_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/rack_session/rack_session/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"tag_name": "v2.1.0", "name": "2.1.0", "body": "Cookie fixes", "draft": false}
            ])))
            .mount(&server)
            .await;

        let notes = client_for(&server)
            .notes_for(&UpgradeRecord::new("rack-session", "2.0.0", "2.1.0"))
            .await
            .unwrap();
        assert_eq!(notes.origin.as_deref(), Some("rack_session/rack_session"));
    }

    #[tokio::test]
    async fn test_notes_for_network_failure() {
        let releases = GitHubReleases::new(Client::new(), "http://127.0.0.1:1")
            .with_timeout(Duration::from_secs(1));
        let notes = releases
            .notes_for(&UpgradeRecord::new("rack", "3.1.7", "3.1.8"))
            .await;
        assert!(notes.is_none());
    }
}
