//! GitHub REST client
//!
//! Fetches project boards through the projects API and counts issues and
//! pull requests through the search API. Every request is bounded by the
//! client timeout.

use crate::source::DataSource;
use crate::wire;
use async_trait::async_trait;
use board_core::{BoardError, CountQuery, ResourceRef, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use serde_json::Value;
use std::time::Duration;

// Projects (classic) still sit behind the inertia preview
const PROJECTS_PREVIEW: &str = "application/vnd.github.inertia-preview+json";
const USER_AGENT: &str = "board-exporter";
const PER_PAGE: &str = "100";
const MAX_PAGES: usize = 50;
const ERROR_BODY_LIMIT: usize = 200;

/// GitHub data source
#[derive(Debug, Clone)]
pub struct GithubSource {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl GithubSource {
    /// Create a client against `api_url` (usually `https://api.github.com`)
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(PROJECTS_PREVIEW));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| BoardError::Config(format!("could not create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BoardError::fetch(url, describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(BoardError::fetch(
                url,
                format!("GitHub API error {}: {}", status, excerpt),
            ));
        }

        Ok(response)
    }

    async fn json(response: reqwest::Response, url: &str) -> Result<Value> {
        response
            .json()
            .await
            .map_err(|e| BoardError::fetch(url, format!("invalid JSON: {}", e)))
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// URL of the `rel="next"` page in a `Link` header
fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let url = segments
            .next()?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')?;
        segments
            .any(|s| s.trim() == "rel=\"next\"")
            .then(|| url.to_string())
    })
}

#[async_trait]
impl DataSource for GithubSource {
    fn project_ref(&self, project_id: u64) -> ResourceRef {
        ResourceRef::new(format!("{}/projects/{}", self.api_url, project_id))
    }

    /// Collection resources are followed through every page
    async fn fetch_resource(&self, reference: &ResourceRef) -> Result<Value> {
        let mut url = reference.as_str().to_string();
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            tracing::debug!("GET {} (page {})", url, page);
            let request = if page == 1 {
                self.client.get(&url).query(&[("per_page", PER_PAGE)])
            } else {
                self.client.get(&url)
            };
            let response = self.send(request, &url).await?;
            let next = next_page(response.headers());

            match (Self::json(response, &url).await?, next) {
                (Value::Array(page_items), Some(next)) => {
                    items.extend(page_items);
                    url = next;
                }
                (Value::Array(page_items), None) => {
                    items.extend(page_items);
                    return Ok(Value::Array(items));
                }
                (single, _) => return Ok(single),
            }
        }

        Err(BoardError::fetch(
            reference.as_str(),
            format!("more than {} pages", MAX_PAGES),
        ))
    }

    async fn update_resource(&self, reference: &ResourceRef, content: &Value) -> Result<Value> {
        let url = reference.as_str();
        tracing::debug!("PATCH {}", url);
        let response = self.send(self.client.patch(url).json(content), url).await?;
        Self::json(response, url).await
    }

    async fn count_matching(&self, query: &CountQuery) -> Result<u64> {
        let url = format!("{}/search/issues", self.api_url);
        let q = query.to_string();
        tracing::debug!("search {}", q);
        let request = self.client.get(&url).query(&[("q", q.as_str()), ("per_page", "1")]);
        let response = self.send(request, &url).await?;
        let value = Self::json(response, &url).await?;
        wire::search_count(value, &ResourceRef::new(url))
    }
}
