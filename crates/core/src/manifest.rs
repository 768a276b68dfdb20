//! HLS master manifest construction.
//!
//! The manifest lists every rendition of a run, ascending by bandwidth, each
//! as an `EXT-X-STREAM-INF` line followed by the rendition's playlist URL.

use std::path::{Path, PathBuf};

use crate::orchestrator::RenditionOutcome;

/// Values substituted into URL templates.
#[derive(Debug, Clone, Copy)]
pub struct UrlContext<'a> {
    /// Video identifier, for `{videoId}`.
    pub video_id: &'a str,
    /// Optional prefix, for `{basePath}`. Trailing slashes are dropped.
    pub base_path: Option<&'a str>,
}

impl<'a> UrlContext<'a> {
    pub fn new(video_id: &'a str, base_path: Option<&'a str>) -> Self {
        Self {
            video_id,
            base_path,
        }
    }

    fn base(&self) -> &'a str {
        self.base_path.map(|b| b.trim_end_matches('/')).unwrap_or("")
    }

    /// Resolves `{videoId}` and `{basePath}` in `template`.
    pub fn resolve(&self, template: &str) -> String {
        template
            .replace("{videoId}", self.video_id)
            .replace("{basePath}", self.base())
    }
}

/// Resolves the playlist URL for one rendition.
pub fn playlist_url(template: &str, ctx: &UrlContext<'_>, rendition: &str, playlist: &str) -> String {
    ctx.resolve(template)
        .replace("{rendition}", rendition)
        .replace("{playlist}", playlist)
}

/// Resolves the master manifest URL handed back to callers.
pub fn manifest_url(template: &str, ctx: &UrlContext<'_>, manifest_name: &str) -> String {
    ctx.resolve(template).replace("{manifest}", manifest_name)
}

/// Builds manifest text from rendition outcomes.
///
/// Outcomes are re-sorted ascending by bandwidth, ties broken by height, so
/// launch and completion order never leak into the output. Each rendition's
/// playlist file name is taken from its local playlist path.
pub fn build(outcomes: &[RenditionOutcome], playlist_url_template: &str, ctx: &UrlContext<'_>) -> String {
    let mut sorted: Vec<&RenditionOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| (o.bandwidth_bps, o.spec.height));

    let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for outcome in sorted {
        let playlist = outcome
            .local_playlist_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        text.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}\n",
            outcome.bandwidth_bps,
            outcome.spec.resolution()
        ));
        text.push_str(&playlist_url(
            playlist_url_template,
            ctx,
            &outcome.spec.name,
            &playlist,
        ));
        text.push('\n');
    }
    text
}

/// Writes manifest text to `output_dir/manifest_name`.
pub async fn write(output_dir: &Path, manifest_name: &str, text: &str) -> std::io::Result<PathBuf> {
    let path = output_dir.join(manifest_name);
    tokio::fs::write(&path, text).await?;
    Ok(path)
}
