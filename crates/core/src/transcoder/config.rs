//! Configuration for the transcoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Length of each media segment in seconds.
    #[serde(default = "default_segment_duration")]
    pub segment_duration_secs: u32,

    /// x264 constant rate factor for re-encoded renditions.
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// H.264 profile for re-encoded renditions.
    #[serde(default = "default_video_profile")]
    pub video_profile: String,

    /// AAC bitrate for re-encoded renditions.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// AAC sample rate for re-encoded renditions.
    #[serde(default = "default_audio_sample_rate")]
    pub audio_sample_rate_hz: u32,

    /// Frame rate assumed when sizing the GOP of a source that reports none.
    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: f64,

    /// Per-encode timeout in seconds. Unbounded when absent.
    #[serde(default)]
    pub encode_timeout_secs: Option<u64>,

    /// Additional global ffmpeg arguments.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "warning".to_string()
}

fn default_segment_duration() -> u32 {
    10
}

fn default_crf() -> u8 {
    20
}

fn default_video_profile() -> String {
    "main".to_string()
}

fn default_audio_bitrate() -> String {
    "128k".to_string()
}

fn default_audio_sample_rate() -> u32 {
    48000
}

fn default_frame_rate() -> f64 {
    25.0
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            ffmpeg_log_level: default_log_level(),
            segment_duration_secs: default_segment_duration(),
            crf: default_crf(),
            video_profile: default_video_profile(),
            audio_bitrate: default_audio_bitrate(),
            audio_sample_rate_hz: default_audio_sample_rate(),
            default_frame_rate: default_frame_rate(),
            encode_timeout_secs: None,
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the segment duration.
    pub fn with_segment_duration(mut self, secs: u32) -> Self {
        self.segment_duration_secs = secs;
        self
    }

    /// Sets the per-encode timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.encode_timeout_secs = Some(timeout_secs);
        self
    }

    /// GOP length in frames so that keyframes land on segment boundaries.
    pub fn gop_size(&self, frame_rate: Option<f64>) -> u32 {
        let fps = frame_rate
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(self.default_frame_rate);
        ((fps * self.segment_duration_secs as f64).round() as u32).max(1)
    }
}
