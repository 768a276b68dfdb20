//! Adaptive-bitrate packaging and object-storage sync for uploaded videos.
//!
//! A source file is probed, planned into renditions, encoded into an HLS tree
//! with a master manifest, and uploaded to a B2-compatible bucket.

pub mod bitrate;
pub mod config;
pub mod directory;
pub mod history;
pub mod manifest;
pub mod metrics;
pub mod orchestrator;
pub mod planner;
pub mod publisher;
pub mod storage;
pub mod sync;
pub mod testing;
pub mod transcoder;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use directory::{ensure_directory, remove_quietly};
pub use history::{UploadHistory, UploadOutcome, UploadTask};
pub use orchestrator::{
    OrchestratorError, OutputConfig, RenditionOutcome, TranscodeOrchestrator, TranscodeRequest,
    TranscodeRun,
};
pub use planner::{plan, PlanError, RenditionSpec, RenditionTemplate};
pub use publisher::{
    PublishReport, PublishRequest, PublisherError, TranscodeOptions, TranscodeOutput,
    VideoPublisher,
};
pub use storage::{B2Client, ObjectStorage, StorageConfig, StorageError, StorageSession};
pub use sync::{DirectorySync, SyncError, SyncResult};
pub use transcoder::{FfmpegTranscoder, SourceProbe, TranscodeError, Transcoder, TranscoderConfig};
