use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::GitHubEndpoints;
use crate::error::{Result, TrendingError};
use crate::fetch::FetchClient;
use crate::trending::{Period, Repository, TrendingQuery};

/// GitHub web, API and raw-content access on top of the fetch client
#[derive(Debug, Clone)]
pub struct GitHubClient {
    fetch: Arc<FetchClient>,
    endpoints: GitHubEndpoints,
    token: Option<String>,
}

/// Subset of the REST repository payload
#[derive(Debug, Clone, Deserialize)]
#[allow(missing_docs)]
pub struct ApiRepository {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub html_url: String,
    pub owner: ApiOwner,
}

/// Owner object nested in [`ApiRepository`]
#[derive(Debug, Clone, Deserialize)]
#[allow(missing_docs)]
pub struct ApiOwner {
    pub login: String,
    pub avatar_url: Option<String>,
}

impl GitHubClient {
    /// Creates a client; `token` is only ever sent to the API host
    pub fn new(fetch: Arc<FetchClient>, endpoints: GitHubEndpoints, token: Option<String>) -> Self {
        Self {
            fetch,
            endpoints,
            token,
        }
    }

    /// Shared fetch client
    pub fn fetch_client(&self) -> &Arc<FetchClient> {
        &self.fetch
    }

    /// Configured hosts
    pub fn endpoints(&self) -> &GitHubEndpoints {
        &self.endpoints
    }

    /// `{web}/trending[/{language}]?since={period}`
    pub fn trending_url(&self, query: &TrendingQuery) -> Result<Url> {
        let mut url = Url::parse(&self.endpoints.web_base)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                TrendingError::Config(format!(
                    "GitHub web base cannot carry a path: {}",
                    self.endpoints.web_base
                ))
            })?;
            segments.pop_if_empty().push("trending");
            if let Some(language) = query.normalized_language() {
                segments.push(&language);
            }
        }
        url.query_pairs_mut()
            .append_pair("since", query.period.as_str());
        Ok(url)
    }

    /// Downloads the trending page for `query`
    pub async fn trending_page(&self, query: &TrendingQuery) -> Result<String> {
        let url = self.trending_url(query)?;
        debug!("Fetching trending page {}", url);
        self.fetch.get_text(url.as_str()).await
    }

    /// Repository page on the web host
    pub fn repository_page_url(&self, owner: &str, name: &str) -> String {
        format!("{}/{}/{}", self.endpoints.web_base.trim_end_matches('/'), owner, name)
    }

    /// Raw file on the default branch
    pub fn raw_file_url(&self, owner: &str, name: &str, file: &str) -> String {
        format!(
            "{}/{}/{}/HEAD/{}",
            self.endpoints.raw_base.trim_end_matches('/'),
            owner,
            name,
            file
        )
    }

    /// REST endpoint for `path` below the API host
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoints.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Headers for API requests, carrying the token when configured
    pub fn api_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| TrendingError::Config(format!("Invalid GitHub token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Looks up a single repository through the REST API
    pub async fn repository(&self, owner: &str, name: &str) -> Result<Repository> {
        let url = self.api_url(&format!("repos/{}/{}", owner, name));
        let api: ApiRepository = self.fetch.get_json(&url, Some(self.api_headers()?)).await?;
        Ok(api.into_repository())
    }
}

impl ApiRepository {
    /// Converts to a record; the API reports no period delta
    pub fn into_repository(self) -> Repository {
        let contributors = self.owner.avatar_url.into_iter().collect();
        Repository {
            owner: self.owner.login,
            name: self.name,
            description: self.description.unwrap_or_default(),
            language: self.language,
            stars: self.stargazers_count,
            stars_in_period: 0,
            forks: self.forks_count,
            contributors,
            period: Period::Daily,
            url: self.html_url,
        }
    }
}

/// Splits `owner/name` (or a GitHub URL) into its parts
pub fn parse_full_name(input: &str) -> Result<(String, String)> {
    let trimmed = input.trim().trim_end_matches(".git");
    let path = trimmed
        .split_once("github.com/")
        .map_or(trimmed, |(_, rest)| rest);
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    match (parts.next(), parts.next()) {
        (Some(owner), Some(name)) => Ok((owner.to_string(), name.to_string())),
        _ => Err(TrendingError::Config(format!(
            "Expected a repository as owner/name, got {:?}",
            input
        ))),
    }
}
