//! Trending listing: query and record types, the page parser, the trend
//! cache, and the service tying them to the GitHub client.

pub mod cache;
pub mod parser;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{Result, TrendingError};
use crate::github::GitHubClient;

pub use cache::TrendCache;
pub use parser::TrendingParser;

/// Languages offered by the `languages` command
pub const POPULAR_LANGUAGES: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "java",
    "go",
    "rust",
    "c++",
    "c",
    "ruby",
    "php",
    "swift",
    "kotlin",
    "dart",
    "shell",
    "html",
    "css",
    "vue",
    "zig",
];

/// Time window of a trending listing
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Stars gained today
    #[default]
    Daily,
    /// Stars gained this week
    Weekly,
    /// Stars gained this month
    Monthly,
}

impl Period {
    /// Value of the `since` query parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = TrendingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Period::Daily),
            "weekly" | "week" => Ok(Period::Weekly),
            "monthly" | "month" => Ok(Period::Monthly),
            other => Err(TrendingError::Config(format!("Unknown period: {}", other))),
        }
    }
}

/// One entry of a trending listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Account or organization owning the repository
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Short description; empty when the markup had none
    #[serde(default)]
    pub description: String,
    /// Primary language
    #[serde(default)]
    pub language: Option<String>,
    /// Total stars
    pub stars: u64,
    /// Stars gained during `period`
    pub stars_in_period: u64,
    /// Total forks
    pub forks: u64,
    /// Avatar URLs of the listed contributors, in page order
    #[serde(default)]
    pub contributors: Vec<String>,
    /// Period of the listing this record came from
    pub period: Period,
    /// Repository page
    pub url: String,
}

impl Repository {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Parameters of one trending page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingQuery {
    /// Language filter as given by the user
    pub language: Option<String>,
    /// Time window
    pub period: Period,
    /// Maximum records returned; 0 keeps every entry on the page
    pub limit: usize,
}

impl TrendingQuery {
    /// Creates a query
    pub fn new(language: Option<&str>, period: Period, limit: usize) -> Self {
        Self {
            language: language.map(str::to_string),
            period,
            limit,
        }
    }

    /// Language filter in canonical form, `None` meaning every language
    ///
    /// Lowercased and trimmed, inner whitespace replaced by `-`; empty,
    /// `all` and `any` mean no filter.
    pub fn normalized_language(&self) -> Option<String> {
        let lang = self.language.as_deref()?.trim().to_lowercase();
        let lang = lang.split_whitespace().collect::<Vec<_>>().join("-");
        match lang.as_str() {
            "" | "all" | "any" => None,
            _ => Some(lang),
        }
    }

    /// Deterministic cache key; equivalent queries produce identical keys
    pub fn canonical_key(&self) -> String {
        format!(
            "trending:v1:lang={}:since={}:limit={}",
            self.normalized_language().as_deref().unwrap_or("*"),
            self.period.as_str(),
            self.limit
        )
    }
}

/// Repositories returned by [`TrendingService::fetch`]
#[derive(Debug, Clone)]
pub struct TrendingResult {
    /// Records in trending rank order
    pub repositories: Vec<Repository>,
    /// Whether the records came from the trend cache
    pub from_cache: bool,
}

/// Fetches trending listings through the trend cache
pub struct TrendingService {
    github: GitHubClient,
    parser: TrendingParser,
    cache: Option<TrendCache>,
}

impl TrendingService {
    /// Creates a service; pass `None` to bypass caching entirely
    pub fn new(github: GitHubClient, cache: Option<TrendCache>) -> Result<Self> {
        let parser = TrendingParser::with_base_url(&github.endpoints().web_base)?;
        Ok(Self {
            github,
            parser,
            cache,
        })
    }

    /// Returns the listing for `query`
    ///
    /// A fresh cache entry is served unless `refresh` is set. Fetched results
    /// are written back; a failed write is logged and does not fail the call.
    pub async fn fetch(&self, query: &TrendingQuery, refresh: bool) -> Result<TrendingResult> {
        if let (Some(cache), false) = (&self.cache, refresh) {
            if let Some(repositories) = cache.get(query).await {
                info!(
                    "Trend cache hit for {} ({} repositories)",
                    query.canonical_key(),
                    repositories.len()
                );
                return Ok(TrendingResult {
                    repositories,
                    from_cache: true,
                });
            }
        }

        let html = self.github.trending_page(query).await?;
        let mut repositories = self.parser.parse(&html, query.period)?;
        if query.limit > 0 {
            repositories.truncate(query.limit);
        }
        info!(
            "Fetched {} trending repositories for {}",
            repositories.len(),
            query.canonical_key()
        );

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(query, &repositories).await {
                warn!("Failed to cache trending results: {}", e);
            }
        }

        Ok(TrendingResult {
            repositories,
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_period_round_trip() {
        for period in [Period::Daily, Period::Weekly, Period::Monthly] {
            assert_eq!(period.as_str().parse::<Period>().unwrap(), period);
        }
        assert!("yearly".parse::<Period>().is_err());
    }

    #[test]
    fn test_canonical_key_normalizes_language() {
        let a = TrendingQuery::new(Some("  Rust "), Period::Weekly, 25);
        let b = TrendingQuery::new(Some("rust"), Period::Weekly, 25);
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.canonical_key(), "trending:v1:lang=rust:since=weekly:limit=25");

        let all = TrendingQuery::new(Some("All"), Period::Daily, 10);
        let none = TrendingQuery::new(None, Period::Daily, 10);
        assert_eq!(all.canonical_key(), none.canonical_key());
    }

    #[test]
    fn test_canonical_key_distinguishes_parameters() {
        let base = TrendingQuery::new(Some("go"), Period::Daily, 25);
        let other_period = TrendingQuery::new(Some("go"), Period::Monthly, 25);
        let other_limit = TrendingQuery::new(Some("go"), Period::Daily, 10);
        let other_lang = TrendingQuery::new(Some("rust"), Period::Daily, 25);
        assert_ne!(base.canonical_key(), other_period.canonical_key());
        assert_ne!(base.canonical_key(), other_limit.canonical_key());
        assert_ne!(base.canonical_key(), other_lang.canonical_key());
    }

    #[test]
    fn test_multi_word_language() {
        let query = TrendingQuery::new(Some("Jupyter   Notebook"), Period::Daily, 25);
        assert_eq!(query.normalized_language().as_deref(), Some("jupyter-notebook"));
    }

    proptest! {
        #[test]
        fn prop_case_and_padding_do_not_change_key(
            lang in "[a-zA-Z+#]{1,12}",
            pad_left in " {0,3}",
            pad_right in " {0,3}",
            limit in 0usize..100,
        ) {
            let plain = TrendingQuery::new(Some(&lang.to_lowercase()), Period::Daily, limit);
            let noisy = TrendingQuery::new(
                Some(&format!("{}{}{}", pad_left, lang.to_uppercase(), pad_right)),
                Period::Daily,
                limit,
            );
            prop_assert_eq!(plain.canonical_key(), noisy.canonical_key());
        }
    }
}
