//! Output layout configuration.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use super::types::OrchestratorError;

/// Where and how a run lays out its files.
///
/// Each run owns `root/{video_id}`; rendition `name` writes into
/// `root/{video_id}/{name}/{playlist_name}` plus numbered segments, and the
/// master manifest lands at `root/{video_id}/{manifest_name}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Root under which run directories are created.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// File name of the master manifest.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// File name of each rendition playlist.
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,

    /// Segment file name pattern (printf-style index).
    #[serde(default = "default_segment_pattern")]
    pub segment_pattern: String,

    /// URL written into the manifest for each rendition.
    /// Placeholders: `{videoId}`, `{basePath}`, `{rendition}`, `{playlist}`.
    #[serde(default = "default_playlist_url_template")]
    pub playlist_url_template: String,

    /// URL handed back to callers for the master manifest.
    /// Placeholders: `{videoId}`, `{basePath}`, `{manifest}`.
    #[serde(default = "default_manifest_url_template")]
    pub manifest_url_template: String,

    /// Delete the uploaded input file once a run is over.
    #[serde(default = "default_remove_input")]
    pub remove_input_after_run: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from("output")
}

fn default_manifest_name() -> String {
    "master.m3u8".to_string()
}

fn default_playlist_name() -> String {
    "playlist.m3u8".to_string()
}

fn default_segment_pattern() -> String {
    "segment_%03d.ts".to_string()
}

fn default_playlist_url_template() -> String {
    "{rendition}/playlist.m3u8".to_string()
}

fn default_manifest_url_template() -> String {
    "{basePath}/{videoId}/master.m3u8".to_string()
}

fn default_remove_input() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            manifest_name: default_manifest_name(),
            playlist_name: default_playlist_name(),
            segment_pattern: default_segment_pattern(),
            playlist_url_template: default_playlist_url_template(),
            manifest_url_template: default_manifest_url_template(),
            remove_input_after_run: default_remove_input(),
        }
    }
}

impl OutputConfig {
    /// Creates a config rooted at `root` with default names.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Run directory for a video. Keyed by video id only, so two runs never
    /// share a directory unless they share an id.
    ///
    /// The id must be a single plain path segment; anything that would
    /// resolve to `root`, its parent or elsewhere is rejected.
    pub fn run_dir(&self, video_id: &str) -> Result<PathBuf, OrchestratorError> {
        let mut components = Path::new(video_id).components();
        let single_segment = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single_segment || video_id.contains(['/', '\\']) {
            return Err(OrchestratorError::InvalidVideoId {
                video_id: video_id.to_string(),
            });
        }
        Ok(self.root.join(video_id))
    }

    /// Manifest path inside a run directory.
    pub fn manifest_path(&self, run_dir: &Path) -> PathBuf {
        run_dir.join(&self.manifest_name)
    }
}
