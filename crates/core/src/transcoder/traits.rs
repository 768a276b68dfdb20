//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::TranscodeError;
use super::types::{EncodeProgress, EncodeResult, RenditionJob, SourceProbe};

/// The external engine boundary: probes sources and encodes renditions.
///
/// An encode is a single call that resolves once the engine exits; progress is
/// reported out-of-band through an optional channel.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Probes a source file.
    async fn probe(&self, path: &Path) -> Result<SourceProbe, TranscodeError>;

    /// Encodes one rendition into its own subdirectory.
    async fn encode(&self, job: RenditionJob) -> Result<EncodeResult, TranscodeError>;

    /// Encodes one rendition with progress reporting.
    ///
    /// If the receiver is dropped, encoding continues without progress reporting.
    async fn encode_with_progress(
        &self,
        job: RenditionJob,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<EncodeResult, TranscodeError>;

    /// Validates that the engine binaries are available.
    async fn validate(&self) -> Result<(), TranscodeError>;
}
