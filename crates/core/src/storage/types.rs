//! Types for the storage module.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Suffixes treated as video or playlist content by `list_video_files`.
pub const VIDEO_SUFFIXES: &[&str] = &[".m3u8", ".ts", ".m4s", ".mp4", ".mov", ".mkv", ".webm"];

/// Page size used when a listing has to walk the whole bucket.
pub const LIST_PAGE_SIZE: u32 = 1000;

/// An authorized session against the storage API.
///
/// Held by one client instance; replaced whenever the remote side rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSession {
    /// Account the session belongs to.
    pub account_id: String,
    /// Base URL for API calls.
    pub api_url: String,
    /// Token sent with every API call.
    pub authorization_token: String,
    /// Base URL for downloads.
    pub download_url: String,
}

/// A stored object, or a pseudo-folder in delimiter listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Remote file id (absent for folders).
    #[serde(default)]
    pub file_id: Option<String>,
    /// Full object key.
    pub file_name: String,
    /// Size in bytes.
    #[serde(default)]
    pub content_length: u64,
    /// Hex SHA1 of the content.
    #[serde(default)]
    pub content_sha1: Option<String>,
    /// Declared content type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Upload time in milliseconds since the epoch.
    #[serde(default)]
    pub upload_timestamp: i64,
    /// "upload", "folder", "hide" or "start".
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_action() -> String {
    "upload".to_string()
}

impl FileInfo {
    /// Whether this entry is a pseudo-folder.
    pub fn is_folder(&self) -> bool {
        self.action == "folder"
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileListPage {
    /// Files on this page.
    pub files: Vec<FileInfo>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Direct children of a pseudo-folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderListing {
    /// Sub-folder keys, each ending in `/`.
    pub folders: Vec<String>,
    /// Files sitting directly under the folder.
    pub files: Vec<FileInfo>,
}

/// A one-time upload target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    /// Bucket the slot belongs to.
    #[serde(default)]
    pub bucket_id: String,
    /// URL to POST the file to.
    pub upload_url: String,
    /// Token for that URL only.
    pub authorization_token: String,
}

/// Content type declared for an uploaded file, by suffix.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("m3u8") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("mp4") => "video/mp4",
        Some("m4s") => "video/iso.segment",
        _ => "b2/x-auto",
    }
}

/// Whether `key` ends in one of [`VIDEO_SUFFIXES`], or in `suffix` when given.
pub fn matches_video_suffix(key: &str, suffix: Option<&str>) -> bool {
    let key = key.to_ascii_lowercase();
    match suffix {
        Some(suffix) => key.ends_with(&suffix.to_ascii_lowercase()),
        None => VIDEO_SUFFIXES.iter().any(|s| key.ends_with(s)),
    }
}
