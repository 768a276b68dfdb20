//! Types for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::planner::RenditionSpec;

/// What the prober learned about a source file.
///
/// Produced once per input and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProbe {
    /// Probed file.
    pub path: PathBuf,
    /// Width of the first video stream in pixels.
    pub width: u32,
    /// Height of the first video stream in pixels.
    pub height: u32,
    /// Container duration in seconds (0.0 if unknown).
    pub duration_secs: f64,
    /// Overall bitrate in bits per second, after the fallback chain.
    pub bitrate_bps: u64,
    /// Video codec name (e.g. "h264").
    pub video_codec: String,
    /// Average frame rate, when the stream reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<f64>,
    /// Whether the source carries at least one audio stream.
    pub has_audio: bool,
    /// Codec of the first audio stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    /// File size in bytes (0 if unknown).
    pub size_bytes: u64,
}

impl SourceProbe {
    /// Resolution formatted as `WxH`.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// One encode invocation: produce a segmented playlist for a single rendition.
#[derive(Debug, Clone)]
pub struct RenditionJob {
    /// Unique job identifier (`{video_id}-{rendition}`).
    pub job_id: String,
    /// Source file.
    pub input_path: PathBuf,
    /// Rendition subdirectory the playlist and segments are written into.
    pub output_dir: PathBuf,
    /// File name of the rendition playlist inside `output_dir`.
    pub playlist_name: String,
    /// Segment file name pattern inside `output_dir` (printf-style index).
    pub segment_pattern: String,
    /// What to produce.
    pub spec: RenditionSpec,
    /// Whether the source has audio to carry over.
    pub has_audio: bool,
    /// Source frame rate, used to align keyframes to segment boundaries.
    pub frame_rate: Option<f64>,
    /// Source duration, used for progress percentages.
    pub duration_secs: Option<f64>,
}

impl RenditionJob {
    /// Full path of the rendition playlist.
    pub fn playlist_path(&self) -> PathBuf {
        self.output_dir.join(&self.playlist_name)
    }

    /// Full path pattern handed to the segmenter.
    pub fn segment_path_pattern(&self) -> PathBuf {
        self.output_dir.join(&self.segment_pattern)
    }
}

/// Progress update emitted while a rendition encodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeProgress {
    /// Job identifier.
    pub job_id: String,
    /// Rendition name.
    pub rendition: String,
    /// Percentage complete (0-100).
    pub percent: f32,
    /// Current position in seconds.
    pub time_secs: f64,
    /// Total duration in seconds (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Encoding speed (e.g. "2.5x").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
}

/// Terminal result of a successful encode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeResult {
    /// Job identifier.
    pub job_id: String,
    /// Rendition name.
    pub rendition: String,
    /// Written rendition playlist.
    pub playlist_path: PathBuf,
    /// Number of media segments found next to the playlist.
    pub segment_count: usize,
    /// Wall-clock time spent encoding in milliseconds.
    pub duration_ms: u64,
}
