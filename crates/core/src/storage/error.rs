//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur talking to object storage.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No `[storage]` section was configured.
    #[error("Object storage is not configured")]
    NotConfigured,

    /// Session missing, expired or rejected after the single retry.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// One file could not be uploaded.
    #[error("Upload of {key} failed: {reason}")]
    Upload { key: String, reason: String },

    /// The remote API answered with an error body.
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Transport failure.
    #[error("Request failed: {0}")]
    Http(String),

    /// Request timed out.
    #[error("Request timeout")]
    Timeout,

    /// Local file could not be read.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Client construction failed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Create an upload error for `key`.
    pub fn upload(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is attributable to the session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_)) || matches!(self, Self::Api { status: 401, .. })
    }

    /// Whether the caller may reasonably try the same call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::Upload { .. } => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}
