//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the engine and storage
//! traits, allowing end-to-end tests of the publisher without ffmpeg or a
//! network.
//!
//! # Example
//!
//! ```rust,ignore
//! use vodsync_core::testing::{MockStorage, MockTranscoder};
//!
//! let transcoder = MockTranscoder::new();
//! let storage = MockStorage::new();
//!
//! // Configure failures
//! transcoder.fail_rendition("720p").await;
//! storage.fail_key("v1/480p/segment_001.ts").await;
//! ```

mod mock_storage;
mod mock_transcoder;

pub use mock_storage::{MockStorage, StoredObject};
pub use mock_transcoder::{MockTranscoder, RecordedEncode};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::planner::{RenditionSpec, RenditionTemplate};
    use crate::transcoder::SourceProbe;

    /// Create a probe for an h264/aac source with reasonable defaults.
    pub fn source_probe(width: u32, height: u32, bitrate_bps: u64) -> SourceProbe {
        SourceProbe {
            path: PathBuf::from("/uploads/source.mp4"),
            width,
            height,
            duration_secs: 60.0,
            bitrate_bps,
            video_codec: "h264".to_string(),
            frame_rate: Some(25.0),
            has_audio: true,
            audio_codec: Some("aac".to_string()),
            size_bytes: bitrate_bps / 8 * 60,
        }
    }

    /// The conventional two-entry table: 480p@800k and 720p@1500k.
    pub fn two_rung_table() -> Vec<RenditionTemplate> {
        vec![
            RenditionTemplate::new("480p", 854, 480, "800k"),
            RenditionTemplate::new("720p", 1280, 720, "1500k"),
        ]
    }

    /// Planned specs for a 1920x1080 source at 4 Mbps against [`two_rung_table`].
    pub fn specs_1080p() -> Vec<RenditionSpec> {
        vec![
            rendition("480p", 854, 480, "800k", false),
            rendition("720p", 1280, 720, "1500k", false),
            rendition("1080p", 1920, 1080, "4000000", true),
        ]
    }

    /// Create a rendition spec.
    pub fn rendition(name: &str, width: u32, height: u32, bitrate: &str, copy: bool) -> RenditionSpec {
        RenditionSpec {
            name: name.to_string(),
            width,
            height,
            target_bitrate: bitrate.to_string(),
            is_source_copy: copy,
        }
    }

    /// Write `files` (relative paths) under `root`, creating parents.
    pub fn write_tree(root: &Path, files: &[&str]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|rel| {
                let path = root.join(rel);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).expect("create fixture dir");
                }
                std::fs::write(&path, rel.as_bytes()).expect("write fixture file");
                path
            })
            .collect()
    }
}
