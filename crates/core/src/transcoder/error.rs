//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while probing or encoding through the external engine.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The prober process failed.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// The input has no video stream.
    #[error("No video stream in {path}")]
    NoVideoStream { path: PathBuf },

    /// The video stream does not report usable dimensions.
    #[error("Could not determine video dimensions of {path}")]
    MissingDimensions { path: PathBuf },

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// The encode process failed.
    #[error("Encode failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encode exceeded the configured timeout.
    #[error("Encode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while preparing or inspecting output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encode was cancelled.
    #[error("Encode cancelled")]
    Cancelled,
}

impl TranscodeError {
    /// Creates a new encode failed error with captured diagnostic output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error came out of probing rather than encoding.
    pub fn is_probe_error(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. }
                | Self::ProbeFailed { .. }
                | Self::NoVideoStream { .. }
                | Self::MissingDimensions { .. }
                | Self::ParseError { .. }
                | Self::FfprobeNotFound { .. }
        )
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }

    /// Error text including any diagnostic output the engine produced.
    pub fn detailed_message(&self) -> String {
        match self {
            Self::EncodeFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}\n{}", self, stderr.trim_end()),
            _ => self.to_string(),
        }
    }
}
