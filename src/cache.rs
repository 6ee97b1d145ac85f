use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, TrendingError};

/// Name prefix of in-flight writes; such files are never entries
const TEMP_PREFIX: &str = ".tmp";

/// Represents a single entry in the file cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Canonical key the entry was stored under
    pub key: String,
    /// When this entry was written
    pub created_at: DateTime<Utc>,
    /// How long this entry remains valid, in seconds
    pub ttl_secs: u64,
    /// Cached value
    pub payload: T,
}

/// Entry metadata without the payload, for sweeping and statistics
#[derive(Debug, Deserialize)]
struct EntryHeader {
    key: String,
    created_at: DateTime<Utc>,
    ttl_secs: u64,
}

fn expired_at(created_at: DateTime<Utc>, ttl_secs: u64, now: DateTime<Utc>) -> bool {
    let ttl = ChronoDuration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX));
    match created_at.checked_add_signed(ttl) {
        Some(deadline) => now >= deadline,
        None => false,
    }
}

impl<T> CacheEntry<T> {
    /// Whether the entry is past its TTL at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        expired_at(self.created_at, self.ttl_secs, now)
    }

    /// Whether the entry is past its TTL right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Counts reported by [`FileCache::stats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entry files found
    pub total: usize,
    /// Entries still within their TTL
    pub valid: usize,
    /// Entries past their TTL or unreadable
    pub expired: usize,
    /// Bytes on disk across all entries
    pub bytes: u64,
}

/// A directory of JSON entries, one file per key
///
/// File names are the SHA-256 of the key; the key itself is stored inside the
/// entry and must match on read. Writes go to a temporary file in the same
/// directory and are renamed into place, so a reader never sees a partial entry.
/// Unreadable or corrupt entries are treated as misses.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
}

impl FileCache {
    /// Creates a cache rooted at `dir` whose new entries live for `ttl`
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    /// Directory holding the entries
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// TTL applied to new entries
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// File an entry for `key` lives in
    pub fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Reads the entry for `key`, expired or not
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let path = self.path_for(key);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.key != key {
            warn!(
                "Cache entry {} holds key {:?}, expected {:?}",
                path.display(),
                entry.key,
                key
            );
            return None;
        }
        Some(entry)
    }

    /// Payload for `key` if present and within its TTL
    pub async fn get_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_fresh_at(key, Utc::now()).await
    }

    /// Payload for `key` if present and within its TTL at `now`
    pub async fn get_fresh_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let entry = self.get::<T>(key).await?;
        if entry.is_expired_at(now) {
            debug!("Cache entry for {} expired at {}", key, now);
            return None;
        }
        Some(entry.payload)
    }

    /// Stores `payload` under `key`, replacing any previous entry
    pub async fn put<T: Serialize>(&self, key: &str, payload: &T) -> Result<()> {
        self.put_at(key, payload, Utc::now()).await
    }

    /// Stores `payload` under `key` as if written at `created_at`
    pub async fn put_at<T: Serialize>(
        &self,
        key: &str,
        payload: &T,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            created_at,
            ttl_secs: self.ttl.as_secs(),
            payload,
        };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        let dir = self.dir.clone();
        let path = self.path_for(key);

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| TrendingError::CacheIo(format!("cache writer panicked: {}", e)))?
    }

    /// Removes the entry for `key`, reporting whether one existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(cache_io("remove entry", &e)),
        }
    }

    /// Deletes every entry, returning how many were removed
    ///
    /// Temporary files left by interrupted writes are removed too but not
    /// counted. A write racing this call may fail to move its file into place.
    pub async fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| cache_io("remove entry", &e))?;
            removed += 1;
        }
        for path in self.list_files(is_temp_file).await? {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed leftover temp file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(cache_io("remove temp file", &e)),
            }
        }
        Ok(removed)
    }

    /// Deletes entries past their TTL (and unreadable ones)
    pub async fn clear_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for path in self.entry_files().await? {
            let expired = match read_header(&path).await {
                Some(header) => expired_at(header.created_at, header.ttl_secs, now),
                None => true,
            };
            if expired {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| cache_io("remove entry", &e))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Counts entries and their size on disk
    pub async fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let mut stats = CacheStats::default();
        for path in self.entry_files().await? {
            stats.total += 1;
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                stats.bytes += meta.len();
            }
            match read_header(&path).await {
                Some(header) if !expired_at(header.created_at, header.ttl_secs, now) => {
                    stats.valid += 1
                }
                _ => stats.expired += 1,
            }
        }
        Ok(stats)
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        self.list_files(|path| path.extension().map_or(false, |ext| ext == "json"))
            .await
    }

    async fn list_files(&self, keep: fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(cache_io("list cache directory", &e)),
        };
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| cache_io("list cache directory", &e))?
        {
            let path = item.path();
            if keep(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

async fn read_header(path: &Path) -> Option<EntryHeader> {
    let content = tokio::fs::read(path).await.ok()?;
    let header: EntryHeader = serde_json::from_slice(&content).ok()?;
    debug!("Read cache header for {}", header.key);
    Some(header)
}

fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.starts_with(TEMP_PREFIX))
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| cache_io("create cache directory", &e))?;
    let mut tmp: NamedTempFile = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| cache_io("create temp file", &e))?;
    tmp.write_all(bytes)
        .map_err(|e| cache_io("write temp file", &e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| cache_io("sync temp file", &e))?;
    tmp.persist(path)
        .map_err(|e| cache_io("move entry into place", &e.error))?;
    Ok(())
}

fn cache_io(action: &str, e: &std::io::Error) -> TrendingError {
    TrendingError::CacheIo(format!("failed to {}: {}", action, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        value: String,
    }

    fn payload(value: &str) -> Payload {
        Payload {
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(60));

        cache.put("alpha", &payload("one")).await.unwrap();
        let entry = cache.get::<Payload>("alpha").await.unwrap();
        assert_eq!(entry.key, "alpha");
        assert_eq!(entry.ttl_secs, 60);
        assert_eq!(entry.payload, payload("one"));
        assert_eq!(cache.get_fresh::<Payload>("alpha").await, Some(payload("one")));
        assert!(cache.get::<Payload>("beta").await.is_none());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(24 * 3600));
        let written = Utc::now();
        cache.put_at("k", &payload("v"), written).await.unwrap();

        let hit = written + ChronoDuration::hours(23);
        let miss = written + ChronoDuration::hours(25);
        assert_eq!(cache.get_fresh_at::<Payload>("k", hit).await, Some(payload("v")));
        assert_eq!(cache.get_fresh_at::<Payload>("k", miss).await, None);

        // Expired entries are still readable until swept
        assert!(cache.get::<Payload>("k").await.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(60));
        std::fs::write(cache.path_for("broken"), b"{ not json").unwrap();

        assert!(cache.get::<Payload>("broken").await.is_none());
        cache.put("broken", &payload("fixed")).await.unwrap();
        assert_eq!(cache.get_fresh::<Payload>("broken").await, Some(payload("fixed")));
    }

    #[tokio::test]
    async fn test_remove_and_clear_all() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(60));
        for key in ["a", "b", "c"] {
            cache.put(key, &payload(key)).await.unwrap();
        }

        assert!(cache.remove("a").await.unwrap());
        assert!(!cache.remove("a").await.unwrap());
        assert_eq!(cache.clear_all().await.unwrap(), 2);
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());
    }

    #[tokio::test]
    async fn test_clear_expired_and_stats() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(3600));
        cache.put("fresh", &payload("f")).await.unwrap();
        cache
            .put_at("stale", &payload("s"), Utc::now() - ChronoDuration::hours(2))
            .await
            .unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.expired, 1);
        assert!(stats.bytes > 0);

        assert_eq!(cache.clear_expired().await.unwrap(), 1);
        assert!(cache.get::<Payload>("stale").await.is_none());
        assert!(cache.get::<Payload>("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_clear_all_removes_interrupted_writes() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(60));
        cache.put("kept", &payload("k")).await.unwrap();
        let leftover = temp_dir.path().join(".tmpAbC123");
        std::fs::write(&leftover, b"{\"key\": \"half").unwrap();

        assert_eq!(cache.stats().await.unwrap().total, 1);
        assert_eq!(cache.clear_all().await.unwrap(), 1);
        assert!(!leftover.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_partial_entries() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path(), Duration::from_secs(60));
        let big = |c: char| payload(&c.to_string().repeat(256 * 1024));
        let writers = ['a', 'b', 'c', 'd', 'e', 'f'];
        cache.put("shared", &big('a')).await.unwrap();

        let mut handles = Vec::new();
        for &c in &writers {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..4 {
                    cache.put("shared", &big(c)).await.unwrap();
                }
                None
            }));
        }
        for _ in 0..6 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..20 {
                    seen.push(cache.get::<Payload>("shared").await.map(|e| e.payload));
                }
                Some(seen)
            }));
        }

        let valid: Vec<Payload> = writers.iter().map(|&c| big(c)).collect();
        for handle in handles {
            for read in handle.await.unwrap().unwrap_or_default() {
                let read = read.expect("reader saw no entry while writes were in flight");
                assert!(valid.contains(&read), "reader saw a payload nobody wrote");
            }
        }
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path().join("never-created"), Duration::from_secs(1));
        assert_eq!(cache.stats().await.unwrap().total, 0);
        assert_eq!(cache.clear_all().await.unwrap(), 0);
    }
}
