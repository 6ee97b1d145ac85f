use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{Analysis, DetailLevel};
use crate::cache::{CacheStats, FileCache};
use crate::error::Result;

/// Content hash identifying one analysis request
///
/// Covers the README text, the detail level and the model identifier, and
/// nothing about which repository the README came from. Fields are length
/// prefixed so no two distinct triples share an encoding.
pub fn analysis_key(readme: &str, detail: DetailLevel, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"analysis:v1\0");
    hasher.update(detail.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update((model.len() as u64).to_le_bytes());
    hasher.update(model.as_bytes());
    hasher.update((readme.len() as u64).to_le_bytes());
    hasher.update(readme.as_bytes());
    hex::encode(hasher.finalize())
}

/// Analysis results addressed by [`analysis_key`]
///
/// Reads treat expired entries as misses without deleting them; removal
/// happens through [`AnalysisCache::invalidate`] or the clear operations.
#[derive(Debug, Clone)]
pub struct AnalysisCache {
    store: FileCache,
}

impl AnalysisCache {
    /// Creates a cache in `dir` whose entries live for `ttl` by default
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            store: FileCache::new(dir, ttl),
        }
    }

    /// Default TTL for new entries
    pub fn ttl(&self) -> Duration {
        self.store.ttl()
    }

    /// Fresh analysis for `key`
    pub async fn get(&self, key: &str) -> Option<Analysis> {
        self.store.get_fresh(key).await
    }

    /// Analysis for `key` as seen at `now`
    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<Analysis> {
        self.store.get_fresh_at(key, now).await
    }

    /// Stores `analysis` under `key` with its own `ttl`, overwriting any entry
    pub async fn put(&self, key: &str, analysis: &Analysis, ttl: Duration) -> Result<()> {
        debug!("Caching analysis {} for {:?}", key, ttl);
        if ttl == self.store.ttl() {
            self.store.put(key, analysis).await
        } else {
            FileCache::new(self.store.dir(), ttl).put(key, analysis).await
        }
    }

    /// Stores `analysis` as if written at `created_at`
    pub async fn put_at(&self, key: &str, analysis: &Analysis, created_at: DateTime<Utc>) -> Result<()> {
        self.store.put_at(key, analysis, created_at).await
    }

    /// Removes the entry for `key`
    pub async fn invalidate(&self, key: &str) -> Result<bool> {
        self.store.remove(key).await
    }

    /// Removes entries past their TTL
    pub async fn clear_expired(&self) -> Result<usize> {
        self.store.clear_expired().await
    }

    /// Removes every entry regardless of TTL
    pub async fn clear_all(&self) -> Result<usize> {
        self.store.clear_all().await
    }

    /// Entry counts and size
    pub async fn stats(&self) -> Result<CacheStats> {
        self.store.stats().await
    }
}
