//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::transcoder::{
    EncodeProgress, EncodeResult, RenditionJob, SourceProbe, TranscodeError, Transcoder,
};

/// A recorded encode job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// The job that was submitted.
    pub job: RenditionJob,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Writes a real playlist and segment files so the output tree can be synced
/// - Fails selected renditions by name
/// - Controls probe results per path
/// - Sends one progress update per encode
#[derive(Debug)]
pub struct MockTranscoder {
    /// Recorded encodes.
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, SourceProbe>>>,
    /// Renditions whose encode fails.
    failing: Arc<RwLock<HashSet<String>>>,
    /// If set, the next probe fails with this error.
    next_probe_error: Arc<RwLock<Option<TranscodeError>>>,
    /// Simulated encode duration.
    encode_duration: Arc<RwLock<Duration>>,
    /// Segments written per rendition.
    segments_per_rendition: Arc<RwLock<usize>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            encodes: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
            next_probe_error: Arc::new(RwLock::new(None)),
            encode_duration: Arc::new(RwLock::new(Duration::ZERO)),
            segments_per_rendition: Arc::new(RwLock::new(2)),
        }
    }

    /// Get all recorded encodes.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Get the number of encodes attempted.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, probe: SourceProbe) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), probe);
    }

    /// Make every encode of `rendition` fail.
    pub async fn fail_rendition(&self, rendition: &str) {
        self.failing.write().await.insert(rendition.to_string());
    }

    /// Configure the next probe to fail with the given error.
    pub async fn set_next_probe_error(&self, error: TranscodeError) {
        *self.next_probe_error.write().await = Some(error);
    }

    /// Set the simulated encode duration.
    pub async fn set_encode_duration(&self, duration: Duration) {
        *self.encode_duration.write().await = duration;
    }

    /// Set how many segment files each encode writes.
    pub async fn set_segments_per_rendition(&self, count: usize) {
        *self.segments_per_rendition.write().await = count;
    }

    async fn write_output(&self, job: &RenditionJob) -> Result<usize, TranscodeError> {
        let count = *self.segments_per_rendition.read().await;
        tokio::fs::create_dir_all(&job.output_dir).await?;

        let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-PLAYLIST-TYPE:VOD\n");
        for i in 0..count {
            let name = format!("segment_{:03}.ts", i);
            tokio::fs::write(job.output_dir.join(&name), format!("{}-{}", job.spec.name, i)).await?;
            playlist.push_str(&format!("#EXTINF:10.0,\n{}\n", name));
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(job.playlist_path(), playlist).await?;
        Ok(count)
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<SourceProbe, TranscodeError> {
        if let Some(err) = self.next_probe_error.write().await.take() {
            return Err(err);
        }

        if let Some(probe) = self.probe_results.read().await.get(path) {
            return Ok(probe.clone());
        }

        let mut probe = super::fixtures::source_probe(1920, 1080, 4_000_000);
        probe.path = path.to_path_buf();
        Ok(probe)
    }

    async fn encode(&self, job: RenditionJob) -> Result<EncodeResult, TranscodeError> {
        let duration = *self.encode_duration.read().await;
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        if self.failing.read().await.contains(&job.spec.name) {
            self.encodes.write().await.push(RecordedEncode {
                job: job.clone(),
                success: false,
            });
            return Err(TranscodeError::encode_failed(
                "FFmpeg exited with code: Some(1)",
                Some(format!("simulated failure for {}", job.spec.name)),
            ));
        }

        let segment_count = self.write_output(&job).await?;

        self.encodes.write().await.push(RecordedEncode {
            job: job.clone(),
            success: true,
        });

        Ok(EncodeResult {
            job_id: job.job_id.clone(),
            rendition: job.spec.name.clone(),
            playlist_path: job.playlist_path(),
            segment_count,
            duration_ms: duration.as_millis() as u64,
        })
    }

    async fn encode_with_progress(
        &self,
        job: RenditionJob,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<EncodeResult, TranscodeError> {
        let _ = progress_tx
            .send(EncodeProgress {
                job_id: job.job_id.clone(),
                rendition: job.spec.name.clone(),
                percent: 50.0,
                time_secs: 5.0,
                duration_secs: job.duration_secs,
                speed: Some("10x".to_string()),
            })
            .await;

        self.encode(job).await
    }

    async fn validate(&self) -> Result<(), TranscodeError> {
        Ok(())
    }
}
