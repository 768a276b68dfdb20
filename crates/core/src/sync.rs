//! Directory sync: upload a local tree to object storage.
//!
//! Every file under the root becomes one [`UploadTask`] keyed by its relative
//! path joined onto the remote prefix with `/`. Uploads run concurrently and
//! settle independently; a sync with failures is a partial result, not an
//! error.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::history::{UploadHistory, UploadOutcome, UploadTask};
use crate::metrics;
use crate::storage::ObjectStorage;

/// Errors that stop a sync before any upload starts.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Aggregated result of one sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// True only when nothing failed.
    pub success: bool,
    pub successful_uploads: Vec<UploadOutcome>,
    pub failed_uploads: Vec<UploadOutcome>,
    /// This sync's outcomes in the order they settled.
    pub history: Vec<UploadOutcome>,
}

/// Uploads directory trees through an [`ObjectStorage`] backend.
pub struct DirectorySync<S>
where
    S: ObjectStorage + 'static,
{
    storage: Arc<S>,
    history: UploadHistory,
}

impl<S> DirectorySync<S>
where
    S: ObjectStorage + 'static,
{
    /// Create a sync recording into `history`.
    pub fn new(storage: Arc<S>, history: UploadHistory) -> Self {
        Self { storage, history }
    }

    /// The ledger outcomes are recorded into.
    pub fn history(&self) -> &UploadHistory {
        &self.history
    }

    /// Uploads every file under `local_root` to `bucket_id` below `remote_prefix`.
    pub async fn sync_directory(
        &self,
        bucket_id: &str,
        local_root: &Path,
        remote_prefix: &str,
    ) -> Result<SyncResult, SyncError> {
        let tasks = collect_tasks(local_root, remote_prefix).await?;
        metrics::SYNC_FILES.observe(tasks.len() as f64);

        info!(
            bucket_id,
            remote_prefix,
            files = tasks.len(),
            "Starting directory sync"
        );

        // Every upload in flight at once; outcomes arrive as they settle
        let in_flight = tasks.len().max(1);
        let history: Vec<UploadOutcome> = stream::iter(tasks)
            .map(|task| self.upload_one(bucket_id, remote_prefix, task))
            .buffer_unordered(in_flight)
            .collect()
            .await;

        let (successful_uploads, failed_uploads): (Vec<_>, Vec<_>) =
            history.iter().cloned().partition(|o| o.succeeded);
        let success = failed_uploads.is_empty();

        if success {
            info!(remote_prefix, uploaded = successful_uploads.len(), "Directory sync complete");
        } else {
            warn!(
                remote_prefix,
                uploaded = successful_uploads.len(),
                failed = failed_uploads.len(),
                "Directory sync partially failed"
            );
        }

        Ok(SyncResult {
            success,
            successful_uploads,
            failed_uploads,
            history,
        })
    }

    async fn upload_one(&self, bucket_id: &str, remote_prefix: &str, task: UploadTask) -> UploadOutcome {
        let outcome = match self
            .storage
            .upload_file(bucket_id, &task.remote_key, &task.local_path)
            .await
        {
            Ok(info) => {
                metrics::UPLOADS_TOTAL.with_label_values(&["success"]).inc();
                UploadOutcome::success(task, info.file_id, info.content_sha1)
            }
            Err(e) => {
                metrics::UPLOADS_TOTAL.with_label_values(&["failed"]).inc();
                warn!(remote_key = %task.remote_key, error = %e, "Upload failed");
                UploadOutcome::failure(task, e.to_string())
            }
        };

        self.history.record(remote_prefix, outcome.clone()).await;
        outcome
    }
}

/// Remote key for `path` under `root`, `/`-joined onto `prefix`.
pub fn remote_key_for(root: &Path, path: &Path, prefix: &str) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        return None;
    }

    let prefix = prefix.trim_end_matches('/');
    let joined = parts.join("/");
    Some(if prefix.is_empty() {
        joined
    } else {
        format!("{}/{}", prefix, joined)
    })
}

/// Walks `root` and derives one task per regular file, in sorted order.
async fn collect_tasks(root: &Path, prefix: &str) -> Result<Vec<UploadTask>, SyncError> {
    let walk_err = |path: &Path, source| SyncError::Walk {
        path: path.to_path_buf(),
        source,
    };

    let mut tasks = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| walk_err(&dir, e))?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| walk_err(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| walk_err(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                if let Some(remote_key) = remote_key_for(root, &path, prefix) {
                    tasks.push(UploadTask {
                        local_path: path,
                        remote_key,
                    });
                }
            }
        }
    }

    tasks.sort_by(|a, b| a.remote_key.cmp(&b.remote_key));
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockStorage};
    use tempfile::TempDir;

    #[test]
    fn test_remote_key_for() {
        let root = Path::new("/out/v123");
        assert_eq!(
            remote_key_for(root, Path::new("/out/v123/480p/segment001.ts"), "v123").as_deref(),
            Some("v123/480p/segment001.ts")
        );
        assert_eq!(
            remote_key_for(root, Path::new("/out/v123/master.m3u8"), "videos/v123/").as_deref(),
            Some("videos/v123/master.m3u8")
        );
        assert_eq!(
            remote_key_for(root, Path::new("/out/v123/master.m3u8"), "").as_deref(),
            Some("master.m3u8")
        );
        assert_eq!(remote_key_for(root, Path::new("/elsewhere/a.ts"), "v123"), None);
    }

    #[tokio::test]
    async fn test_collect_tasks_walks_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("480p")).unwrap();
        std::fs::create_dir_all(root.join("720p").join("deep")).unwrap();
        std::fs::write(root.join("master.m3u8"), "m").unwrap();
        std::fs::write(root.join("480p").join("segment001.ts"), "s").unwrap();
        std::fs::write(root.join("720p").join("deep").join("x.ts"), "x").unwrap();

        let tasks = collect_tasks(root, "v123").await.unwrap();
        let keys: Vec<&str> = tasks.iter().map(|t| t.remote_key.as_str()).collect();

        assert_eq!(
            keys,
            vec!["v123/480p/segment001.ts", "v123/720p/deep/x.ts", "v123/master.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_collect_tasks_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = collect_tasks(&temp.path().join("gone"), "p").await.unwrap_err();
        assert!(matches!(err, SyncError::Walk { .. }));
    }

    #[tokio::test]
    async fn test_history_covers_only_this_sync() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("v1");
        fixtures::write_tree(&root, &["master.m3u8", "480p/playlist.m3u8", "480p/segment_000.ts"]);

        let storage = Arc::new(MockStorage::new());
        let ledger = UploadHistory::new();
        let sync = DirectorySync::new(Arc::clone(&storage), ledger.clone());

        let first = sync.sync_directory("bucket-1", &root, "v1").await.unwrap();
        assert_eq!(first.history.len(), 3);

        storage.fail_key("v1/480p/segment_000.ts").await;
        let second = sync.sync_directory("bucket-1", &root, "v1").await.unwrap();

        assert_eq!(second.history.len(), 3);
        assert_eq!(second.failed_uploads.len(), 1);
        assert_eq!(
            second.history.iter().filter(|o| !o.succeeded).count(),
            second.failed_uploads.len()
        );

        let mut keys: Vec<&str> = second.history.iter().map(|o| o.task.remote_key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["v1/480p/playlist.m3u8", "v1/480p/segment_000.ts", "v1/master.m3u8"]
        );

        // The shared ledger keeps both runs
        assert_eq!(ledger.get("v1").await.len(), 6);
    }
}
