//! Types for the publisher.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::OrchestratorError;
use crate::planner::PlanError;
use crate::storage::StorageError;
use crate::sync::{SyncError, SyncResult};
use crate::transcoder::{EncodeProgress, TranscodeError};

/// Errors surfaced by the publisher.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// Probing failed.
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// Nothing could be planned.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The run failed or a rendition did.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Storage call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The output tree could not be walked.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// No bucket was given and none is configured.
    #[error("No bucket given and no default bucket configured")]
    NoBucket,
}

/// Observability and control for one transcode.
#[derive(Debug, Clone, Default)]
pub struct TranscodeOptions {
    /// Receives encode progress from every rendition.
    pub progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    /// Stops launching renditions and kills running encodes when raised.
    pub cancel: CancellationToken,
}

/// Result of a successful transcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeOutput {
    /// Run directory holding renditions and the manifest.
    pub output_dir: PathBuf,
    /// Master manifest on disk.
    pub manifest_path: PathBuf,
    /// Manifest URL resolved from the configured template.
    pub manifest_url: String,
}

/// Input to the end-to-end flow.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub input_path: PathBuf,
    pub video_id: String,
    /// Bucket to upload into; the configured default when absent.
    pub bucket_id: Option<String>,
    pub base_path: Option<String>,
    pub options: TranscodeOptions,
}

impl PublishRequest {
    pub fn new(input_path: impl Into<PathBuf>, video_id: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            video_id: video_id.into(),
            bucket_id: None,
            base_path: None,
            options: TranscodeOptions::default(),
        }
    }

    pub fn with_bucket(mut self, bucket_id: impl Into<String>) -> Self {
        self.bucket_id = Some(bucket_id.into());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_options(mut self, options: TranscodeOptions) -> Self {
        self.options = options;
        self
    }
}

/// What the end-to-end flow produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishReport {
    pub video_id: String,
    /// Manifest URL resolved from the configured template.
    pub manifest_url: String,
    /// Key of the uploaded master manifest.
    pub remote_manifest_key: String,
    /// Per-file upload report.
    pub sync: SyncResult,
}
