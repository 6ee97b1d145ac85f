#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! github-trending - fetch GitHub Trending and analyze repositories with an LLM
//!
//! The library covers the whole pipeline behind the CLI:
//!
//! ## Features
//! - Per-host token bucket rate limiting
//! - Retrying HTTP fetches with User-Agent rotation and proxy support
//! - Tolerant parsing of the trending page
//! - README resolution from the raw host, the REST API or the repository page
//! - File-backed trend and analysis caches with expiry
//! - LLM analysis with content-hashed cache keys and bounded batch concurrency
//!
//! ## Usage
//! ```rust,ignore
//! use github_trending::{Config, Period, TrendingQuery};
//!
//! async fn example() -> github_trending::Result<()> {
//!     let config = Config::load(None)?;
//!     let app = github_trending::App::from_config(&config)?;
//!     let result = app
//!         .trending
//!         .fetch(&TrendingQuery::new(Some("rust"), Period::Daily, 10), false)
//!         .await?;
//!     println!("{} repositories", result.repositories.len());
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

/// LLM analysis types, cache and engine
pub mod analysis;
/// File-backed cache entry store shared by both caches
pub mod cache;
/// Configuration module for the application
pub mod config;
/// Error handling types and utilities
pub mod error;
/// Rate-limited, retrying HTTP client
pub mod fetch;
/// GitHub endpoints and REST lookups
pub mod github;
/// LLM provider contract and implementations
pub mod llm;
/// Logging configuration and utilities
pub mod logging;
/// Table and JSON rendering
pub mod output;
/// Parallel processing utilities
pub mod parallel;
/// Prompt templates
pub mod prompts;
/// Rate limiting functionality to respect remote hosts
pub mod rate_limiter;
/// README resolution
pub mod readme;
/// Snapshot history
pub mod storage;
/// Trending queries, parsing and caching
pub mod trending;
/// Utilities (retry helpers, text helpers)
pub mod utils;

// Re-export common types
pub use analysis::{Analysis, AnalysisCache, AnalysisEngine, AnalyzeOptions, DetailLevel};
pub use config::Config;
pub use error::{Result, TrendingError};
pub use fetch::FetchClient;
pub use github::GitHubClient;
pub use llm::{LlmProvider, Provider, ProviderKind};
pub use rate_limiter::RateLimiter;
pub use readme::{ReadmeResolver, ReadmeSource};
pub use trending::{Period, Repository, TrendCache, TrendingQuery, TrendingService};

/// Collaborators wired from one configuration
pub struct App {
    /// GitHub client shared by the trending service and the README resolver
    pub github: GitHubClient,
    /// Trending fetch with optional caching
    pub trending: TrendingService,
    /// README resolver
    pub readme: Arc<ReadmeResolver>,
    /// Analysis cache, absent when caching is disabled
    pub analysis_cache: Option<AnalysisCache>,
}

impl App {
    /// Builds the fetch stack and caches described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetch = Arc::new(FetchClient::from_config(config)?);
        let github = GitHubClient::new(
            fetch,
            config.github.clone(),
            config.api_keys.github_token.clone(),
        );

        let trend_cache = config
            .cache
            .enabled
            .then(|| TrendCache::new(config.cache.trending_dir(), config.cache.trending_ttl()));
        let analysis_cache = config
            .cache
            .enabled
            .then(|| AnalysisCache::new(config.cache.analysis_dir(), config.cache.analysis_ttl()));

        Ok(Self {
            trending: TrendingService::new(github.clone(), trend_cache)?,
            readme: Arc::new(ReadmeResolver::new(github.clone(), config.readme_budgets.clone())?),
            github,
            analysis_cache,
        })
    }

    /// Analysis engine on top of this app's README resolver and cache
    pub fn analysis_engine(&self, config: &Config, provider: Arc<dyn LlmProvider>) -> AnalysisEngine {
        let params = llm::CallParams {
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        };
        AnalysisEngine::new(
            self.readme.clone(),
            self.analysis_cache.clone(),
            provider,
            params,
            config.cache.analysis_ttl(),
        )
        .with_concurrency(config.llm.concurrency)
    }
}
