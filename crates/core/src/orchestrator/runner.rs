//! Transcode orchestrator implementation.
//!
//! Launches one encode per planned rendition, lets every job settle, then
//! makes a single publish decision: the manifest is written only when all
//! renditions succeeded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::directory::ensure_directory;
use crate::manifest::{self, UrlContext};
use crate::metrics;
use crate::planner::RenditionSpec;
use crate::transcoder::{EncodeProgress, RenditionJob, SourceProbe, TranscodeError, Transcoder};

use super::config::OutputConfig;
use super::types::{OrchestratorError, RenditionFailure, RenditionOutcome, TranscodeRun};

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub video_id: String,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub specs: Vec<RenditionSpec>,
    pub base_path: Option<String>,
    pub has_audio: bool,
    pub frame_rate: Option<f64>,
    pub duration_secs: Option<f64>,
    pub progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    pub cancel: CancellationToken,
}

impl TranscodeRequest {
    /// Creates a request for a source assumed to carry audio.
    pub fn new(
        video_id: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        specs: Vec<RenditionSpec>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            specs,
            base_path: None,
            has_audio: true,
            frame_rate: None,
            duration_secs: None,
            progress_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Copies stream facts from the source probe.
    pub fn with_source(mut self, probe: &SourceProbe) -> Self {
        self.has_audio = probe.has_audio;
        self.frame_rate = probe.frame_rate;
        self.duration_secs = (probe.duration_secs > 0.0).then_some(probe.duration_secs);
        self
    }

    pub fn with_base_path(mut self, base_path: Option<String>) -> Self {
        self.base_path = base_path;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EncodeProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Runs rendition encodes concurrently and gates the manifest on all of them.
pub struct TranscodeOrchestrator<T>
where
    T: Transcoder + 'static,
{
    transcoder: Arc<T>,
    output: OutputConfig,
}

impl<T> TranscodeOrchestrator<T>
where
    T: Transcoder + 'static,
{
    /// Create a new orchestrator.
    pub fn new(transcoder: Arc<T>, output: OutputConfig) -> Self {
        Self { transcoder, output }
    }

    /// Output layout in use.
    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Runs every planned rendition and publishes the manifest.
    ///
    /// Jobs are fail-independent: one failure never stops its siblings. Once
    /// all settle, any failure yields [`OrchestratorError::Publish`] and no
    /// manifest exists on disk.
    pub async fn run(&self, request: TranscodeRequest) -> Result<TranscodeRun, OrchestratorError> {
        if request.specs.is_empty() {
            return Err(OrchestratorError::EmptyPlan);
        }

        let video_id = request.video_id.clone();
        let output_dir = request.output_dir.clone();

        ensure_directory(&output_dir)
            .await
            .map_err(|e| OrchestratorError::io(&output_dir, e))?;

        // A manifest left over from an earlier run must not survive a failure
        let manifest_path = self.output.manifest_path(&output_dir);
        remove_stale_manifest(&manifest_path).await?;

        info!(
            video_id = %video_id,
            renditions = request.specs.len(),
            "Starting transcode run"
        );

        let outcomes = self.run_jobs(&request).await;

        let failed: Vec<RenditionFailure> = outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| RenditionFailure {
                rendition: o.spec.name.clone(),
                error: o.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect();

        if !failed.is_empty() {
            metrics::RUNS_TOTAL.with_label_values(&["publish_failed"]).inc();
            for failure in &failed {
                warn!(
                    video_id = %video_id,
                    rendition = %failure.rendition,
                    error = %failure.error,
                    "Rendition failed"
                );
            }
            return Err(OrchestratorError::Publish {
                failed,
                total: outcomes.len(),
            });
        }

        let ctx = UrlContext::new(&video_id, request.base_path.as_deref());
        let text = manifest::build(&outcomes, &self.output.playlist_url_template, &ctx);
        let manifest_path = manifest::write(&output_dir, &self.output.manifest_name, &text)
            .await
            .map_err(|e| OrchestratorError::io(&manifest_path, e))?;

        metrics::RUNS_TOTAL.with_label_values(&["published"]).inc();
        info!(
            video_id = %video_id,
            manifest = %manifest_path.display(),
            "Transcode run published"
        );

        Ok(TranscodeRun {
            video_id,
            output_dir,
            outcomes,
            manifest_path,
        })
    }

    /// Launches one task per spec and waits for all of them.
    async fn run_jobs(&self, request: &TranscodeRequest) -> Vec<RenditionOutcome> {
        let mut launched = Vec::with_capacity(request.specs.len());

        for spec in &request.specs {
            let job = RenditionJob {
                job_id: format!("{}-{}", request.video_id, spec.name),
                input_path: request.input_path.clone(),
                output_dir: request.output_dir.join(&spec.name),
                playlist_name: self.output.playlist_name.clone(),
                segment_pattern: self.output.segment_pattern.clone(),
                spec: spec.clone(),
                has_audio: request.has_audio,
                frame_rate: request.frame_rate,
                duration_secs: request.duration_secs,
            };

            if request.cancel.is_cancelled() {
                debug!(rendition = %spec.name, "Run cancelled before launch");
                launched.push(Launched::Skipped(RenditionOutcome::failed(
                    spec.clone(),
                    job.playlist_path(),
                    TranscodeError::Cancelled.to_string(),
                )));
                continue;
            }

            let playlist = job.playlist_path();
            let transcoder = Arc::clone(&self.transcoder);
            let progress_tx = request.progress_tx.clone();
            let cancel = request.cancel.clone();

            let handle = tokio::spawn(async move { encode_one(transcoder, job, progress_tx, cancel).await });
            launched.push(Launched::Running {
                spec: spec.clone(),
                playlist,
                handle,
            });
        }

        let settled = join_all(launched.into_iter().map(|l| async move {
            match l {
                Launched::Skipped(outcome) => outcome,
                Launched::Running {
                    spec,
                    playlist,
                    handle,
                } => match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => RenditionOutcome::failed(spec, playlist, format!("encode task aborted: {}", e)),
                },
            }
        }))
        .await;

        for outcome in &settled {
            let result = if outcome.succeeded { "success" } else { "failed" };
            metrics::RENDITIONS_ENCODED.with_label_values(&[result]).inc();
        }

        settled
    }
}

enum Launched {
    Skipped(RenditionOutcome),
    Running {
        spec: RenditionSpec,
        playlist: PathBuf,
        handle: tokio::task::JoinHandle<RenditionOutcome>,
    },
}

/// Runs one rendition job to a settled outcome.
async fn encode_one<T: Transcoder>(
    transcoder: Arc<T>,
    job: RenditionJob,
    progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    cancel: CancellationToken,
) -> RenditionOutcome {
    let spec = job.spec.clone();
    let playlist = job.playlist_path();

    if let Err(e) = ensure_directory(&job.output_dir).await {
        return RenditionOutcome::failed(spec, playlist, TranscodeError::Io(e).detailed_message());
    }

    debug!(job_id = %job.job_id, rendition = %spec.name, copy = spec.is_source_copy, "Launching encode");

    let encode = async {
        match progress_tx {
            Some(tx) => transcoder.encode_with_progress(job, tx).await,
            None => transcoder.encode(job).await,
        }
    };

    // Dropping the encode future kills the engine process
    let result = tokio::select! {
        r = encode => r,
        _ = cancel.cancelled() => Err(TranscodeError::Cancelled),
    };

    match result {
        Ok(encoded) => {
            let mode = if spec.is_source_copy { "copy" } else { "reencode" };
            metrics::ENCODE_DURATION
                .with_label_values(&[mode])
                .observe(encoded.duration_ms as f64 / 1000.0);
            debug!(
                rendition = %spec.name,
                segments = encoded.segment_count,
                duration_ms = encoded.duration_ms,
                "Rendition encoded"
            );
            RenditionOutcome {
                bandwidth_bps: spec.bandwidth_bps(),
                spec,
                local_playlist_path: encoded.playlist_path,
                succeeded: true,
                error: None,
                segment_count: encoded.segment_count,
            }
        }
        Err(e) => RenditionOutcome::failed(spec, playlist, e.detailed_message()),
    }
}

async fn remove_stale_manifest(path: &Path) -> Result<(), OrchestratorError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "Removed stale manifest");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OrchestratorError::io(path, e)),
    }
}
