//! Durable log storage
//!
//! Persisting logs is a side effect off the critical path: callers log a
//! failure and move on, it never changes a job's status.

use crate::error::HarnessError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Destination for bounded job logs
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Persist `log_file` under `parent_id`; returns where it ended up
    async fn store(&self, log_file: &Path, parent_id: &str) -> Result<PathBuf, HarnessError>;
}

/// Stores logs as `<root>/<parent_id>/<file name>`
#[derive(Debug, Clone)]
pub struct DirectoryLogStore {
    root: PathBuf,
}

impl DirectoryLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl LogStore for DirectoryLogStore {
    async fn store(&self, log_file: &Path, parent_id: &str) -> Result<PathBuf, HarnessError> {
        if parent_id.is_empty() || parent_id.contains(['/', '\\']) || parent_id == ".." {
            return Err(HarnessError::Configuration(format!(
                "Invalid log parent id: {:?}",
                parent_id
            )));
        }

        let file_name = log_file.file_name().ok_or_else(|| {
            HarnessError::Configuration(format!("Not a file: {}", log_file.display()))
        })?;

        let dir = self.root.join(parent_id);
        tokio::fs::create_dir_all(&dir).await?;

        let dest = dir.join(file_name);
        tokio::fs::copy(log_file, &dest).await?;

        Ok(dest)
    }
}

/// Store `log_file` if it has content. Failures are logged, not returned.
pub async fn persist_best_effort(store: &dyn LogStore, log_file: &Path, parent_id: &str) {
    match tokio::fs::metadata(log_file).await {
        Ok(meta) if meta.len() > 0 => {}
        Ok(_) => {
            tracing::debug!(path = %log_file.display(), "Empty log file; not storing");
            return;
        }
        Err(e) => {
            tracing::warn!(path = %log_file.display(), error = %e, "Log file unreadable; not storing");
            return;
        }
    }

    match store.store(log_file, parent_id).await {
        Ok(dest) => {
            tracing::info!(parent_id = %parent_id, dest = %dest.display(), "Log file stored")
        }
        Err(e) => tracing::warn!(
            parent_id = %parent_id,
            path = %log_file.display(),
            error = %e,
            "Unable to store log file"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_directory_store_places_under_parent() {
        let src = tempdir().unwrap();
        let root = tempdir().unwrap();
        let log = src.path().join("1234-docker_logs.txt");
        fs::write(&log, "done\n").unwrap();

        let store = DirectoryLogStore::new(root.path());
        let dest = store.store(&log, "syn999").await.unwrap();

        assert_eq!(dest, root.path().join("syn999").join("1234-docker_logs.txt"));
        assert_eq!(fs::read_to_string(dest).unwrap(), "done\n");
    }

    #[tokio::test]
    async fn test_directory_store_rejects_path_parent() {
        let src = tempdir().unwrap();
        let log = src.path().join("log.txt");
        fs::write(&log, "x").unwrap();

        let store = DirectoryLogStore::new(src.path());
        assert!(store.store(&log, "../escape").await.is_err());
    }

    #[tokio::test]
    async fn test_persist_skips_empty_and_swallows_errors() {
        let src = tempdir().unwrap();
        let root = tempdir().unwrap();
        let empty = src.path().join("empty.txt");
        fs::write(&empty, "").unwrap();

        let store = DirectoryLogStore::new(root.path());
        persist_best_effort(&store, &empty, "syn999").await;
        assert!(!root.path().join("syn999").exists());

        persist_best_effort(&store, &src.path().join("missing.txt"), "syn999").await;
    }
}
