//! Types for the transcode orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::planner::RenditionSpec;

/// One rendition that did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionFailure {
    /// Rendition name.
    pub rendition: String,
    /// Engine error text, including captured diagnostics.
    pub error: String,
}

/// Errors that can occur during a transcode run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Nothing was planned.
    #[error("no renditions to encode")]
    EmptyPlan,

    /// The video id cannot name a directory below the output root.
    #[error("invalid video id {video_id:?}: must be a single path segment")]
    InvalidVideoId { video_id: String },

    /// Filesystem failure while preparing or finishing the run.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// At least one rendition failed; the manifest was withheld.
    #[error("{} of {total} renditions failed ({}); manifest withheld", failed.len(), failed_names(failed))]
    Publish {
        failed: Vec<RenditionFailure>,
        total: usize,
    },
}

fn failed_names(failed: &[RenditionFailure]) -> String {
    failed
        .iter()
        .map(|f| f.rendition.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl OrchestratorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Names of failed renditions, empty for non-publish errors.
    pub fn failed_renditions(&self) -> Vec<&str> {
        match self {
            Self::Publish { failed, .. } => failed.iter().map(|f| f.rendition.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

/// Settled result of one rendition job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenditionOutcome {
    /// What was encoded.
    pub spec: RenditionSpec,
    /// Rendition playlist on disk (may be absent when the job failed).
    pub local_playlist_path: PathBuf,
    /// Advertised bandwidth; never zero.
    pub bandwidth_bps: u64,
    /// Whether the encode completed.
    pub succeeded: bool,
    /// Failure text when it did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Segments written next to the playlist.
    pub segment_count: usize,
}

impl RenditionOutcome {
    pub(crate) fn failed(spec: RenditionSpec, playlist: PathBuf, error: impl Into<String>) -> Self {
        let bandwidth_bps = spec.bandwidth_bps();
        Self {
            spec,
            local_playlist_path: playlist,
            bandwidth_bps,
            succeeded: false,
            error: Some(error.into()),
            segment_count: 0,
        }
    }
}

/// A completed, published run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeRun {
    /// Video identifier.
    pub video_id: String,
    /// Run directory, owned by this run until handed to sync.
    pub output_dir: PathBuf,
    /// One outcome per planned rendition, in plan order.
    pub outcomes: Vec<RenditionOutcome>,
    /// Written master manifest.
    pub manifest_path: PathBuf,
}
