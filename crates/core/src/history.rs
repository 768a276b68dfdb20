//! In-memory upload ledger.
//!
//! Outcomes are appended under a caller-chosen key (a video id or a remote
//! prefix) and never evicted. The ledger is diagnostic; the remote store is
//! the authority on what exists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    /// File on disk.
    pub local_path: PathBuf,
    /// Destination key, `/`-separated.
    pub remote_key: String,
}

/// Settled result of one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub task: UploadTask,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_file_id: Option<String>,
    /// Hex SHA1 reported by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl UploadOutcome {
    /// Successful upload.
    pub fn success(task: UploadTask, remote_file_id: Option<String>, content_hash: Option<String>) -> Self {
        Self {
            task,
            succeeded: true,
            remote_file_id,
            content_hash,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Failed upload.
    pub fn failure(task: UploadTask, error: impl Into<String>) -> Self {
        Self {
            task,
            succeeded: false,
            remote_file_id: None,
            content_hash: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only ledger of upload outcomes grouped by key.
///
/// Cheap to clone; clones share the same ledger.
#[derive(Debug, Clone, Default)]
pub struct UploadHistory {
    entries: Arc<RwLock<HashMap<String, Vec<UploadOutcome>>>>,
}

impl UploadHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an outcome under `key`.
    pub async fn record(&self, key: &str, outcome: UploadOutcome) {
        self.entries
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .push(outcome);
    }

    /// Everything recorded under `key`, in insertion order.
    pub async fn get(&self, key: &str) -> Vec<UploadOutcome> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Keys with at least one outcome.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
