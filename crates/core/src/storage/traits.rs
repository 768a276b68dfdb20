//! Trait definitions for the storage module.

use async_trait::async_trait;
use std::path::Path;

use super::error::StorageError;
use super::types::{
    matches_video_suffix, FileInfo, FileListPage, FolderListing, StorageSession, LIST_PAGE_SIZE,
};

/// A flat-namespace object store with B2-style semantics.
///
/// Calls are independently retryable by the caller. Implementations retry on
/// their own only once, after re-authenticating a rejected session.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns the name of this backend.
    fn name(&self) -> &str;

    /// Exchanges credentials for a fresh session.
    async fn authenticate(&self) -> Result<StorageSession, StorageError>;

    /// Uploads one local file under `remote_key`, declaring its SHA1 and size.
    async fn upload_file(
        &self,
        bucket_id: &str,
        remote_key: &str,
        local_path: &Path,
    ) -> Result<FileInfo, StorageError>;

    /// Downloads an object's bytes.
    async fn download_file(&self, bucket_name: &str, remote_key: &str) -> Result<Vec<u8>, StorageError>;

    /// Lists one page of files, starting at `cursor` (or the beginning).
    async fn list_files(
        &self,
        bucket_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<FileListPage, StorageError>;

    /// Lists up to `max` files whose key begins with `prefix`.
    async fn search_by_prefix(
        &self,
        bucket_id: &str,
        prefix: &str,
        max: u32,
    ) -> Result<Vec<FileInfo>, StorageError>;

    /// Lists direct sub-folders and files of a pseudo-folder.
    async fn list_folder(&self, bucket_id: &str, folder_path: &str) -> Result<FolderListing, StorageError>;

    /// Builds an authorized download URL for `remote_key`.
    async fn get_download_url_with_token(
        &self,
        remote_key: &str,
        bucket_name: &str,
    ) -> Result<String, StorageError>;

    /// Case-insensitive substring search over every key in the bucket.
    ///
    /// Walks the whole bucket page by page, so cost grows with bucket size.
    async fn search_by_name(&self, bucket_id: &str, substring: &str) -> Result<Vec<FileInfo>, StorageError> {
        let needle = substring.to_lowercase();
        let mut matches = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .list_files(bucket_id, cursor.as_deref(), LIST_PAGE_SIZE)
                .await?;
            matches.extend(
                page.files
                    .into_iter()
                    .filter(|f| f.file_name.to_lowercase().contains(&needle)),
            );
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(matches)
    }

    /// Lists up to `max` video and playlist files, or only keys ending in
    /// `suffix_filter` when given.
    async fn list_video_files(
        &self,
        bucket_id: &str,
        cursor: Option<&str>,
        max: u32,
        suffix_filter: Option<&str>,
    ) -> Result<Vec<FileInfo>, StorageError> {
        let limit = max as usize;
        let mut found = Vec::new();
        let mut cursor = cursor.map(str::to_string);

        while found.len() < limit {
            let page = self
                .list_files(bucket_id, cursor.as_deref(), LIST_PAGE_SIZE)
                .await?;
            found.extend(
                page.files
                    .into_iter()
                    .filter(|f| matches_video_suffix(&f.file_name, suffix_filter)),
            );
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        found.truncate(limit);
        Ok(found)
    }
}
