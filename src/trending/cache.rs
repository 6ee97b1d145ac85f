use chrono::{DateTime, Utc};
use std::time::Duration;
use std::path::PathBuf;

use super::{Repository, TrendingQuery};
use crate::cache::{CacheStats, FileCache};
use crate::error::Result;

/// File cache of trending results keyed by canonical query
///
/// Expired entries read as misses but stay on disk until
/// [`TrendCache::clear_expired`] or [`TrendCache::clear_all`] runs.
#[derive(Debug, Clone)]
pub struct TrendCache {
    store: FileCache,
}

impl TrendCache {
    /// Creates a trend cache in `dir` with entries living for `ttl`
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            store: FileCache::new(dir, ttl),
        }
    }

    /// Cached results for `query`, if present and fresh
    pub async fn get(&self, query: &TrendingQuery) -> Option<Vec<Repository>> {
        self.store.get_fresh(&query.canonical_key()).await
    }

    /// Cached results for `query` as seen at `now`
    pub async fn get_at(&self, query: &TrendingQuery, now: DateTime<Utc>) -> Option<Vec<Repository>> {
        self.store.get_fresh_at(&query.canonical_key(), now).await
    }

    /// Stores results for `query`; the last writer wins
    pub async fn put(&self, query: &TrendingQuery, repositories: &[Repository]) -> Result<()> {
        self.store.put(&query.canonical_key(), &repositories).await
    }

    /// Removes entries past their TTL
    pub async fn clear_expired(&self) -> Result<usize> {
        self.store.clear_expired().await
    }

    /// Removes every entry
    pub async fn clear_all(&self) -> Result<usize> {
        self.store.clear_all().await
    }

    /// Entry counts and size
    pub async fn stats(&self) -> Result<CacheStats> {
        self.store.stats().await
    }
}
