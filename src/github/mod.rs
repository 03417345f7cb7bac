//! GitHub REST client
//!
//! Every request spends one token from a shared [`TokenBucket`] and fails
//! fast with [`Error::RateLimited`] when the budget is gone. Successful JSON
//! responses are cached for a short TTL; archives are never cached.

mod cache;
mod rate_limit;

pub use cache::{CachedResponse, ResponseCache};
pub use rate_limit::TokenBucket;

use crate::config::GitHubConfig;
use crate::error::{Error, Result};
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// A repository as listed by the organization endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub size: i64,
}

impl Repository {
    /// Why the repository is not indexed, if it is not
    pub fn ineligibility(&self, name_prefix: &str) -> Option<&'static str> {
        if !self.name.starts_with(name_prefix) {
            Some("name does not match prefix")
        } else if self.private {
            Some("private repository")
        } else if self.archived {
            Some("archived repository")
        } else if self.size <= 0 {
            Some("empty repository")
        } else {
            None
        }
    }
}

/// Keep the repositories that should be indexed, in listing order
pub fn filter_eligible(repos: Vec<Repository>, name_prefix: &str) -> Vec<Repository> {
    repos
        .into_iter()
        .filter(|repo| match repo.ineligibility(name_prefix) {
            None => true,
            Some(reason) => {
                if repo.name.starts_with(name_prefix) {
                    info!(repo = %repo.name, reason, "Skipping repository");
                } else {
                    trace!(repo = %repo.name, "Ignoring repository outside module prefix");
                }
                false
            }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ContentPayload {
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// One changed file in a two-ref comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
    /// Unified diff; absent for binary or oversized changes
    #[serde(default)]
    pub patch: Option<String>,
}

/// Result of comparing two refs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub files: Vec<ChangedFile>,
}

/// Extract the `rel="next"` target from a `Link` header
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut sections = part.trim().split(';');
        let url = sections.next()?.trim().trim_matches(|c| c == '<' || c == '>');
        let is_next = sections.any(|s| {
            s.trim()
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"') == "next")
                .unwrap_or(false)
        });
        (is_next && !url.is_empty()).then(|| url.to_string())
    })
}

/// Rate-limited, caching GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: Option<String>,
    cache: ResponseCache,
    rate_limit: TokenBucket,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let token = config.token();
        let capacity = config.rate_limit_for(token.is_some());
        debug!(
            authenticated = token.is_some(),
            capacity, "Created GitHub client"
        );

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            rate_limit: TokenBucket::new(capacity, config.rate_limit_window()),
            cache: ResponseCache::new(config.cache_ttl()),
            token,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Requests left in the current rate-limit window
    pub async fn remaining_requests(&self) -> u32 {
        self.rate_limit.remaining().await
    }

    /// Invalidate every cached response
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("GitHub response cache cleared");
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        if !self.rate_limit.try_acquire().await {
            return Err(Error::RateLimited(format!(
                "request budget exhausted before {}",
                url
            )));
        }

        trace!(url, "GitHub request");
        let mut request = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(request.send().await?)
    }

    fn check_status(response: &reqwest::Response, url: &str) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// GET a resource, served from cache while fresh
    pub async fn get(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(cached) = self.cache.get(url) {
            trace!(url, "Cache hit");
            return Ok(cached.body);
        }

        let response = self.send(url).await?;
        Self::check_status(&response, url)?;
        let body = response.bytes().await?.to_vec();

        self.cache.insert(
            url,
            CachedResponse {
                body: body.clone(),
                next: None,
            },
        );
        Ok(body)
    }

    /// GET one page of a listing, returning the body and the next page URL
    pub async fn get_paginated(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        if let Some(cached) = self.cache.get(url) {
            trace!(url, "Cache hit");
            return Ok((cached.body, cached.next));
        }

        let response = self.send(url).await?;
        Self::check_status(&response, url)?;
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);
        let body = response.bytes().await?.to_vec();

        self.cache.insert(
            url,
            CachedResponse {
                body: body.clone(),
                next: next.clone(),
            },
        );
        Ok((body, next))
    }

    /// Download an archive without caching it.
    ///
    /// 404, 403 and 409 mean the content cannot be served (downloads disabled,
    /// empty repository) and map to [`Error::ContentUnavailable`].
    pub async fn get_archive(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url).await?;
        let status = response.status();
        if matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::CONFLICT
        ) {
            return Err(Error::ContentUnavailable {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Self::check_status(&response, url)?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Every repository of `org`, following pagination
    pub async fn list_org_repos(&self, org: &str) -> Result<Vec<Repository>> {
        let mut next = Some(format!("{}/orgs/{}/repos?per_page=100", self.api_url, org));
        let mut repos = Vec::new();

        while let Some(url) = next {
            let (body, next_url) = self.get_paginated(&url).await?;
            let page: Vec<Repository> = serde_json::from_slice(&body)?;
            debug!(count = page.len(), "Fetched repository page");
            repos.extend(page);
            next = next_url;
        }

        Ok(repos)
    }

    /// README text of a repository
    pub async fn fetch_readme(&self, full_name: &str) -> Result<String> {
        let url = format!("{}/repos/{}/readme", self.api_url, full_name);
        let payload: ContentPayload = serde_json::from_slice(&self.get(&url).await?)?;
        self.content_text(payload).await
    }

    async fn content_text(&self, payload: ContentPayload) -> Result<String> {
        if let Some(download_url) = payload.download_url.filter(|u| !u.is_empty()) {
            let bytes = self.get(&download_url).await?;
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        if let Some(content) = payload.content.filter(|c| !c.is_empty()) {
            let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(cleaned)
                .map_err(|e| Error::Other(format!("Invalid base64 content: {}", e)))?;
            return Ok(String::from_utf8_lossy(&decoded).into_owned());
        }

        Err(Error::Other("No content available".to_string()))
    }

    /// Gzipped tarball of the default branch
    pub async fn fetch_tarball(&self, full_name: &str) -> Result<Vec<u8>> {
        let url = format!("{}/repos/{}/tarball", self.api_url, full_name);
        self.get_archive(&url).await
    }

    /// Files changed between two refs
    pub async fn compare(&self, full_name: &str, from: &str, to: &str) -> Result<Comparison> {
        let url = format!(
            "{}/repos/{}/compare/{}...{}",
            self.api_url, full_name, from, to
        );
        let body = self.get(&url).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo(name: &str) -> Repository {
        Repository {
            name: name.to_string(),
            full_name: format!("org/{}", name),
            description: None,
            updated_at: "2024-01-01T00:00:00Z".to_string(),
            html_url: String::new(),
            private: false,
            archived: false,
            size: 10,
        }
    }

    fn client_for(server: &MockServer) -> GitHubClient {
        let config = GitHubConfig {
            api_url: server.uri(),
            token_env: "MODINDEX_TEST_UNSET_TOKEN".to_string(),
            ..GitHubConfig::default()
        };
        GitHubClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_next_link() {
        let header = r#"<https://api.github.com/orgs/x/repos?page=2>; rel="next", <https://api.github.com/orgs/x/repos?page=5>; rel="last""#;
        assert_eq!(
            parse_next_link(header).as_deref(),
            Some("https://api.github.com/orgs/x/repos?page=2")
        );

        let last_page = r#"<https://api.github.com/orgs/x/repos?page=1>; rel="prev""#;
        assert_eq!(parse_next_link(last_page), None);
        assert_eq!(parse_next_link(""), None);
    }

    #[test]
    fn test_eligibility_filter() {
        let mut private = repo("terraform-azure-private");
        private.private = true;
        let mut archived = repo("terraform-azure-old");
        archived.archived = true;
        let mut empty = repo("terraform-azure-empty");
        empty.size = 0;

        let kept = filter_eligible(
            vec![
                repo("terraform-azure-kv"),
                private,
                archived,
                empty,
                repo("docs-site"),
                repo("terraform-azure-vnet"),
            ],
            "terraform-azure-",
        );
        let names: Vec<_> = kept.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["terraform-azure-kv", "terraform-azure-vnet"]);
    }

    #[tokio::test]
    async fn test_list_follows_pagination() {
        let server = MockServer::start().await;
        let page2 = format!("{}/orgs/acme/repos?per_page=100&page=2", server.uri());

        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!([repo("b")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("link", format!("<{}>; rel=\"next\"", page2).as_str())
                    .set_body_json(serde_json::json!([repo("a")])),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let repos = client.list_org_repos("acme").await.unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_get_is_cached_until_cleared() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thing"))
            .and(header("accept", "application/vnd.github+json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("one"))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let url = format!("{}/thing", server.uri());
        assert_eq!(client.get(&url).await.unwrap(), b"one");
        assert_eq!(client.get(&url).await.unwrap(), b"one");

        client.clear_cache();
        assert_eq!(client.get(&url).await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_error_status_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let url = format!("{}/broken", server.uri());
        match client.get(&url).await {
            Err(Error::HttpStatus { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected status error, got {:?}", other),
        }
        assert!(client.cache.get(&url).is_none());
    }

    #[tokio::test]
    async fn test_archive_unavailable_statuses() {
        let server = MockServer::start().await;
        for (repo, status) in [("gone", 404), ("blocked", 403), ("empty", 409)] {
            Mock::given(method("GET"))
                .and(path(format!("/repos/org/{}/tarball", repo)))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/repos/org/flaky/tarball"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = client_for(&server);
        for repo in ["gone", "blocked", "empty"] {
            let err = client.fetch_tarball(&format!("org/{}", repo)).await.unwrap_err();
            assert!(err.is_content_unavailable(), "{} gave {:?}", repo, err);
        }
        let err = client.fetch_tarball("org/flaky").await.unwrap_err();
        assert!(!err.is_content_unavailable());
    }

    #[tokio::test]
    async fn test_rate_limit_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let config = GitHubConfig {
            api_url: server.uri(),
            token_env: "MODINDEX_TEST_UNSET_TOKEN".to_string(),
            anonymous_rate_limit: 1,
            ..GitHubConfig::default()
        };
        let client = GitHubClient::new(&config).unwrap();
        client.get(&format!("{}/a", server.uri())).await.unwrap();
        let err = client.get(&format!("{}/b", server.uri())).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_readme_inline_and_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/inline/readme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "content": "IyBLZXkg\nVmF1bHQ=\n",
                "download_url": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/org/linked/readme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "download_url": format!("{}/raw/README.md", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/README.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# Linked"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_readme("org/inline").await.unwrap(), "# Key Vault");
        assert_eq!(client.fetch_readme("org/linked").await.unwrap(), "# Linked");
    }

    #[tokio::test]
    async fn test_compare_parses_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/kv/compare/v1.0.0...v1.1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "html_url": "https://github.com/org/kv/compare/v1.0.0...v1.1.0",
                "files": [
                    {"filename": "main.tf", "status": "modified", "patch": "@@ -1 +1 @@\n-a\n+b"},
                    {"filename": "logo.png", "status": "added"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let comparison = client.compare("org/kv", "v1.0.0", "v1.1.0").await.unwrap();
        assert_eq!(comparison.files.len(), 2);
        assert_eq!(comparison.files[0].filename, "main.tf");
        assert!(comparison.files[1].patch.is_none());
    }
}
