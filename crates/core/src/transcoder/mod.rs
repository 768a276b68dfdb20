//! Source probing and per-rendition HLS encoding.
//!
//! The [`Transcoder`] trait is the seam between the pipeline and the encoder
//! binary. [`FfmpegTranscoder`] drives `ffprobe` for inspection and `ffmpeg`
//! for encoding; tests swap in `testing::MockTranscoder`.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{EncodeProgress, EncodeResult, RenditionJob, SourceProbe};
