//! Video publishing façade.
//!
//! Ties the stages together for callers: probe and plan a source, transcode
//! it into an HLS tree, upload that tree, and hand out authorized URLs. Local
//! artifacts are removed once nobody owns them any more, whatever the outcome.

mod types;

pub use types::{PublishReport, PublishRequest, PublisherError, TranscodeOptions, TranscodeOutput};

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::directory::remove_quietly;
use crate::history::UploadHistory;
use crate::manifest::{self, UrlContext};
use crate::orchestrator::{OutputConfig, TranscodeOrchestrator, TranscodeRequest};
use crate::planner::{self, RenditionSpec, RenditionTemplate};
use crate::storage::{ObjectStorage, StorageError};
use crate::sync::{DirectorySync, SyncResult};
use crate::transcoder::{SourceProbe, Transcoder};

/// Storage side of a publisher.
struct StorageTarget<S>
where
    S: ObjectStorage + 'static,
{
    storage: Arc<S>,
    sync: DirectorySync<S>,
    default_bucket_id: Option<String>,
    default_bucket_name: Option<String>,
}

/// Runs the downstream operations over one transcoder and one storage backend.
pub struct VideoPublisher<T, S>
where
    T: Transcoder + 'static,
    S: ObjectStorage + 'static,
{
    transcoder: Arc<T>,
    orchestrator: TranscodeOrchestrator<T>,
    renditions: Vec<RenditionTemplate>,
    history: UploadHistory,
    target: Option<StorageTarget<S>>,
}

impl<T, S> VideoPublisher<T, S>
where
    T: Transcoder + 'static,
    S: ObjectStorage + 'static,
{
    /// Create a transcode-only publisher.
    pub fn new(transcoder: Arc<T>, renditions: Vec<RenditionTemplate>, output: OutputConfig) -> Self {
        Self {
            orchestrator: TranscodeOrchestrator::new(Arc::clone(&transcoder), output),
            transcoder,
            renditions,
            history: UploadHistory::new(),
            target: None,
        }
    }

    /// Attach a storage backend and its default bucket.
    pub fn with_storage(
        mut self,
        storage: Arc<S>,
        default_bucket_id: Option<String>,
        default_bucket_name: Option<String>,
    ) -> Self {
        self.target = Some(StorageTarget {
            sync: DirectorySync::new(Arc::clone(&storage), self.history.clone()),
            storage,
            default_bucket_id,
            default_bucket_name,
        });
        self
    }

    /// Upload ledger shared by every sync this publisher runs.
    pub fn history(&self) -> &UploadHistory {
        &self.history
    }

    pub fn transcoder(&self) -> &Arc<T> {
        &self.transcoder
    }

    /// Output layout in use.
    pub fn output(&self) -> &OutputConfig {
        self.orchestrator.output()
    }

    fn target(&self) -> Result<&StorageTarget<S>, PublisherError> {
        self.target
            .as_ref()
            .ok_or(PublisherError::Storage(StorageError::NotConfigured))
    }

    /// Storage backend, if one is attached.
    pub fn storage(&self) -> Option<&Arc<S>> {
        self.target.as_ref().map(|t| &t.storage)
    }

    /// Probes the source and plans its renditions.
    pub async fn inspect(&self, input_path: &Path) -> Result<(SourceProbe, Vec<RenditionSpec>), PublisherError> {
        let probe = self.transcoder.probe(input_path).await?;
        let specs = planner::plan(&probe, &self.renditions)?;
        Ok((probe, specs))
    }

    /// Plans the renditions for a source.
    pub async fn probe_and_plan(&self, input_path: &Path) -> Result<Vec<RenditionSpec>, PublisherError> {
        Ok(self.inspect(input_path).await?.1)
    }

    /// Transcodes a source into `output.root/{video_id}`.
    ///
    /// On failure the run directory is removed and the error says which
    /// renditions failed.
    pub async fn transcode(
        &self,
        input_path: &Path,
        video_id: &str,
        base_path: Option<&str>,
    ) -> Result<TranscodeOutput, PublisherError> {
        self.transcode_with(input_path, video_id, base_path, TranscodeOptions::default())
            .await
    }

    /// [`transcode`](Self::transcode) with progress reporting and cancellation.
    pub async fn transcode_with(
        &self,
        input_path: &Path,
        video_id: &str,
        base_path: Option<&str>,
        options: TranscodeOptions,
    ) -> Result<TranscodeOutput, PublisherError> {
        let output_dir = self.output().run_dir(video_id)?;
        let (probe, specs) = self.inspect(input_path).await?;

        let mut request = TranscodeRequest::new(video_id, input_path, &output_dir, specs)
            .with_source(&probe)
            .with_base_path(base_path.map(str::to_string))
            .with_cancellation(options.cancel);
        if let Some(tx) = options.progress_tx {
            request = request.with_progress(tx);
        }

        let run = match self.orchestrator.run(request).await {
            Ok(run) => run,
            Err(e) => {
                remove_quietly(&output_dir).await;
                return Err(e.into());
            }
        };

        let output = self.output();
        let manifest_url = manifest::manifest_url(
            &output.manifest_url_template,
            &UrlContext::new(video_id, base_path),
            &output.manifest_name,
        );

        Ok(TranscodeOutput {
            output_dir: run.output_dir,
            manifest_path: run.manifest_path,
            manifest_url,
        })
    }

    /// Uploads a run directory below `remote_prefix`, then removes it.
    ///
    /// Partial failures are reported in the result, not as an error.
    pub async fn publish_to_storage(
        &self,
        bucket_id: &str,
        output_dir: &Path,
        remote_prefix: &str,
    ) -> Result<SyncResult, PublisherError> {
        let target = self.target()?;
        let result = target
            .sync
            .sync_directory(bucket_id, output_dir, remote_prefix)
            .await;

        // Upload has been attempted; the tree is no longer needed
        remove_quietly(output_dir).await;

        Ok(result?)
    }

    /// Authorized download URL for a stored key.
    pub async fn get_authorized_download_url(
        &self,
        remote_key: &str,
        bucket_name: Option<&str>,
    ) -> Result<String, PublisherError> {
        let target = self.target()?;
        let bucket_name = bucket_name
            .or(target.default_bucket_name.as_deref())
            .ok_or(PublisherError::NoBucket)?;

        Ok(target
            .storage
            .get_download_url_with_token(remote_key, bucket_name)
            .await?)
    }

    /// Resolves the bucket id for a request.
    pub fn bucket_id<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str, PublisherError> {
        let target = self.target()?;
        requested
            .or(target.default_bucket_id.as_deref())
            .ok_or(PublisherError::NoBucket)
    }

    /// Probe, plan, transcode and upload one source.
    ///
    /// The run directory and, when configured, the input file are removed
    /// whatever happens.
    pub async fn process(&self, request: PublishRequest) -> Result<PublishReport, PublisherError> {
        let result = self.process_inner(&request).await;

        if self.output().remove_input_after_run && !remove_quietly(&request.input_path).await {
            warn!(path = %request.input_path.display(), "Input file left behind");
        }

        result
    }

    async fn process_inner(&self, request: &PublishRequest) -> Result<PublishReport, PublisherError> {
        let bucket_id = self.bucket_id(request.bucket_id.as_deref())?.to_string();
        let video_id = request.video_id.as_str();

        let transcoded = self
            .transcode_with(
                &request.input_path,
                video_id,
                request.base_path.as_deref(),
                request.options.clone(),
            )
            .await?;

        let sync = self
            .publish_to_storage(&bucket_id, &transcoded.output_dir, video_id)
            .await?;

        let remote_manifest_key = format!("{}/{}", video_id, self.output().manifest_name);

        info!(
            video_id,
            success = sync.success,
            uploaded = sync.successful_uploads.len(),
            failed = sync.failed_uploads.len(),
            "Publish finished"
        );

        Ok(PublishReport {
            video_id: video_id.to_string(),
            manifest_url: transcoded.manifest_url,
            remote_manifest_key,
            sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockStorage, MockTranscoder};
    use tempfile::TempDir;

    fn publisher(
        root: &Path,
        transcoder: &Arc<MockTranscoder>,
        storage: &Arc<MockStorage>,
    ) -> VideoPublisher<MockTranscoder, MockStorage> {
        VideoPublisher::new(
            Arc::clone(transcoder),
            fixtures::two_rung_table(),
            OutputConfig::with_root(root.join("output")),
        )
        .with_storage(
            Arc::clone(storage),
            Some("bucket-1".to_string()),
            Some("videos".to_string()),
        )
    }

    #[tokio::test]
    async fn test_probe_and_plan_1080p() {
        let temp = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::new());
        let storage = Arc::new(MockStorage::new());
        let publisher = publisher(temp.path(), &transcoder, &storage);

        let specs = publisher.probe_and_plan(Path::new("/in/a.mp4")).await.unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["480p", "720p", "1080p"]);
    }

    #[tokio::test]
    async fn test_transcode_failure_cleans_run_dir() {
        let temp = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::new());
        transcoder.fail_rendition("1080p").await;
        let storage = Arc::new(MockStorage::new());
        let publisher = publisher(temp.path(), &transcoder, &storage);

        let err = publisher
            .transcode(Path::new("/in/a.mp4"), "v1", None)
            .await
            .unwrap_err();

        assert!(matches!(err, PublisherError::Orchestrator(_)));
        assert!(!temp.path().join("output").join("v1").exists());
    }

    #[tokio::test]
    async fn test_transcode_manifest_url() {
        let temp = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::new());
        let storage = Arc::new(MockStorage::new());
        let publisher = publisher(temp.path(), &transcoder, &storage);

        let out = publisher
            .transcode(Path::new("/in/a.mp4"), "v1", Some("/stream/"))
            .await
            .unwrap();

        assert_eq!(out.manifest_url, "/stream/v1/master.m3u8");
        assert!(out.manifest_path.exists());
    }

    #[tokio::test]
    async fn test_download_url_uses_default_bucket() {
        let temp = TempDir::new().unwrap();
        let transcoder = Arc::new(MockTranscoder::new());
        let storage = Arc::new(MockStorage::new());
        let publisher = publisher(temp.path(), &transcoder, &storage);

        let url = publisher
            .get_authorized_download_url("v1/master.m3u8", None)
            .await
            .unwrap();
        assert!(url.contains("/file/videos/v1/master.m3u8"));

        let url = publisher
            .get_authorized_download_url("v1/master.m3u8", Some("other"))
            .await
            .unwrap();
        assert!(url.contains("/file/other/"));
    }

    #[tokio::test]
    async fn test_storage_required() {
        let temp = TempDir::new().unwrap();
        let publisher: VideoPublisher<MockTranscoder, MockStorage> = VideoPublisher::new(
            Arc::new(MockTranscoder::new()),
            fixtures::two_rung_table(),
            OutputConfig::with_root(temp.path()),
        );

        let err = publisher
            .get_authorized_download_url("v1/master.m3u8", Some("videos"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublisherError::Storage(StorageError::NotConfigured)));
    }
}
