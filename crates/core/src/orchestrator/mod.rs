//! Transcode orchestration for a single video.
//!
//! - **Encode**: concurrent, one task per planned rendition, no upper bound
//! - **Decide**: after every job settles; the manifest is all-or-nothing

mod config;
mod runner;
mod types;

pub use config::OutputConfig;
pub use runner::{TranscodeOrchestrator, TranscodeRequest};
pub use types::{OrchestratorError, RenditionFailure, RenditionOutcome, TranscodeRun};
