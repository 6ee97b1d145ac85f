use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::analysis::Analysis;
use crate::error::Result;
use crate::trending::Repository;

/// One saved observation of a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the record was saved
    pub recorded_at: DateTime<Utc>,
    /// Repository as fetched
    pub repository: Repository,
    /// Analysis, when one was made
    pub analysis: Option<Analysis>,
}

/// Durable history of fetched repositories
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Records a repository with its optional analysis
    async fn save(&self, repository: &Repository, analysis: Option<&Analysis>) -> Result<()>;
}

/// Appends snapshots to a JSON-lines file
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Store writing to `path`; parent directories are created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// History file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every snapshot back, skipping lines that do not parse
    pub async fn load_all(&self) -> Result<Vec<Snapshot>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!("Skipping history line {}: {}", number + 1, e),
            }
        }
        Ok(snapshots)
    }
}

#[async_trait]
impl SnapshotStore for JsonlStore {
    async fn save(&self, repository: &Repository, analysis: Option<&Analysis>) -> Result<()> {
        let snapshot = Snapshot {
            recorded_at: Utc::now(),
            repository: repository.clone(),
            analysis: analysis.cloned(),
        };
        let mut line = serde_json::to_string(&snapshot)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("Saved snapshot of {}", repository.full_name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trending::Period;
    use tempfile::TempDir;

    fn repo(name: &str) -> Repository {
        Repository {
            owner: "o".into(),
            name: name.into(),
            description: "d".into(),
            language: None,
            stars: 3,
            stars_in_period: 1,
            forks: 0,
            contributors: vec![],
            period: Period::Weekly,
            url: format!("https://github.com/o/{}", name),
        }
    }

    #[tokio::test]
    async fn test_save_appends_lines() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path().join("nested").join("history.jsonl"));

        store.save(&repo("a"), None).await.unwrap();
        store.save(&repo("b"), None).await.unwrap();

        let snapshots = store.load_all().await.unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].repository.name, "a");
        assert_eq!(snapshots[1].repository.name, "b");
        assert!(snapshots[1].analysis.is_none());
    }

    #[tokio::test]
    async fn test_load_skips_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        let store = JsonlStore::new(&path);
        store.save(&repo("a"), None).await.unwrap();
        tokio::fs::write(
            &path,
            format!("{}not json\n", tokio::fs::read_to_string(&path).await.unwrap()),
        )
        .await
        .unwrap();

        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_history() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonlStore::new(temp_dir.path().join("none.jsonl"));
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
