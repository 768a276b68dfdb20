//! Mock object storage for testing.

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{
    content_type_for, FileInfo, FileListPage, FolderListing, ObjectStorage, StorageError,
    StorageSession,
};

/// A stored object.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bucket_id: String,
    pub data: Vec<u8>,
    pub info: FileInfo,
}

/// In-memory implementation of the ObjectStorage trait.
///
/// Provides controllable behavior for testing:
/// - Stores uploads in memory, keyed by remote key
/// - Fails uploads of selected keys (simulated network failure)
/// - Rejects authentication on demand
/// - Pages listings B2-style (cursor is the next key to return)
#[derive(Debug)]
pub struct MockStorage {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    failing_keys: Arc<RwLock<HashSet<String>>>,
    reject_auth: Arc<RwLock<bool>>,
    auth_count: Arc<RwLock<usize>>,
    upload_attempts: Arc<RwLock<usize>>,
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStorage {
    /// Create an empty mock store.
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
            failing_keys: Arc::new(RwLock::new(HashSet::new())),
            reject_auth: Arc::new(RwLock::new(false)),
            auth_count: Arc::new(RwLock::new(0)),
            upload_attempts: Arc::new(RwLock::new(0)),
        }
    }

    /// Make uploads of `remote_key` fail.
    pub async fn fail_key(&self, remote_key: &str) {
        self.failing_keys.write().await.insert(remote_key.to_string());
    }

    /// Reject (or accept) authentication.
    pub async fn set_reject_auth(&self, reject: bool) {
        *self.reject_auth.write().await = reject;
    }

    /// Number of authentications performed.
    pub async fn auth_count(&self) -> usize {
        *self.auth_count.read().await
    }

    /// Number of upload attempts, failed ones included.
    pub async fn upload_attempts(&self) -> usize {
        *self.upload_attempts.read().await
    }

    /// Keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    /// A stored object by key.
    pub async fn get(&self, remote_key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(remote_key).cloned()
    }

    /// Seed an object directly.
    pub async fn insert(&self, bucket_id: &str, remote_key: &str, data: &[u8]) {
        let info = Self::file_info(remote_key, data, content_type_for(Path::new(remote_key)));
        self.objects.write().await.insert(
            remote_key.to_string(),
            StoredObject {
                bucket_id: bucket_id.to_string(),
                data: data.to_vec(),
                info,
            },
        );
    }

    fn file_info(remote_key: &str, data: &[u8], content_type: &str) -> FileInfo {
        FileInfo {
            file_id: Some(format!("mock-{}", remote_key)),
            file_name: remote_key.to_string(),
            content_length: data.len() as u64,
            content_sha1: Some(format!("{:x}", Sha1::digest(data))),
            content_type: Some(content_type.to_string()),
            upload_timestamp: chrono::Utc::now().timestamp_millis(),
            action: "upload".to_string(),
        }
    }

    async fn bucket_files(&self, bucket_id: &str) -> Vec<FileInfo> {
        self.objects
            .read()
            .await
            .values()
            .filter(|o| o.bucket_id == bucket_id)
            .map(|o| o.info.clone())
            .collect()
    }

    async fn check_auth(&self) -> Result<(), StorageError> {
        if *self.reject_auth.read().await {
            return Err(StorageError::Auth("mock credentials rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn authenticate(&self) -> Result<StorageSession, StorageError> {
        self.check_auth().await?;
        *self.auth_count.write().await += 1;
        Ok(StorageSession {
            account_id: "mock-account".to_string(),
            api_url: "mock://api".to_string(),
            authorization_token: "mock-token".to_string(),
            download_url: "mock://download".to_string(),
        })
    }

    async fn upload_file(
        &self,
        bucket_id: &str,
        remote_key: &str,
        local_path: &Path,
    ) -> Result<FileInfo, StorageError> {
        *self.upload_attempts.write().await += 1;
        self.check_auth().await?;

        if self.failing_keys.read().await.contains(remote_key) {
            return Err(StorageError::upload(remote_key, "simulated network failure"));
        }

        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::Io {
                path: local_path.to_path_buf(),
                source: e,
            })?;
        let info = Self::file_info(remote_key, &data, content_type_for(local_path));

        self.objects.write().await.insert(
            remote_key.to_string(),
            StoredObject {
                bucket_id: bucket_id.to_string(),
                data,
                info: info.clone(),
            },
        );
        Ok(info)
    }

    async fn download_file(&self, _bucket_name: &str, remote_key: &str) -> Result<Vec<u8>, StorageError> {
        self.check_auth().await?;
        self.objects
            .read()
            .await
            .get(remote_key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::Api {
                status: 404,
                code: "not_found".to_string(),
                message: format!("File not present: {}", remote_key),
            })
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<FileListPage, StorageError> {
        self.check_auth().await?;
        let files: Vec<FileInfo> = self
            .bucket_files(bucket_id)
            .await
            .into_iter()
            .filter(|f| cursor.map_or(true, |c| f.file_name.as_str() >= c))
            .collect();

        let page_size = page_size.max(1) as usize;
        let next_cursor = files.get(page_size).map(|f| f.file_name.clone());
        Ok(FileListPage {
            files: files.into_iter().take(page_size).collect(),
            next_cursor,
        })
    }

    async fn search_by_prefix(
        &self,
        bucket_id: &str,
        prefix: &str,
        max: u32,
    ) -> Result<Vec<FileInfo>, StorageError> {
        self.check_auth().await?;
        Ok(self
            .bucket_files(bucket_id)
            .await
            .into_iter()
            .filter(|f| f.file_name.starts_with(prefix))
            .take(max as usize)
            .collect())
    }

    async fn list_folder(&self, bucket_id: &str, folder_path: &str) -> Result<FolderListing, StorageError> {
        self.check_auth().await?;
        let trimmed = folder_path.trim_matches('/');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{}/", trimmed)
        };

        let mut listing = FolderListing::default();
        for file in self.bucket_files(bucket_id).await {
            let Some(rest) = file.file_name.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((folder, _)) => {
                    let folder = format!("{}{}/", prefix, folder);
                    if !listing.folders.contains(&folder) {
                        listing.folders.push(folder);
                    }
                }
                None => listing.files.push(file),
            }
        }
        Ok(listing)
    }

    async fn get_download_url_with_token(
        &self,
        remote_key: &str,
        bucket_name: &str,
    ) -> Result<String, StorageError> {
        self.check_auth().await?;
        Ok(format!(
            "mock://download/file/{}/{}?Authorization=mock-token",
            bucket_name, remote_key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_paging_walks_everything() {
        let storage = MockStorage::new();
        for i in 0..5 {
            storage.insert("b1", &format!("v1/seg_{}.ts", i), b"x").await;
        }

        let first = storage.list_files("b1", None, 2).await.unwrap();
        assert_eq!(first.files.len(), 2);
        assert_eq!(first.next_cursor.as_deref(), Some("v1/seg_2.ts"));

        let rest = storage
            .list_files("b1", first.next_cursor.as_deref(), 10)
            .await
            .unwrap();
        assert_eq!(rest.files.len(), 3);
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_search_by_name_default_method() {
        let storage = MockStorage::new();
        storage.insert("b1", "Holiday/master.m3u8", b"m").await;
        storage.insert("b1", "work/master.m3u8", b"m").await;
        storage.insert("b1", "holiday-2/clip.mp4", b"c").await;

        let found = storage.search_by_name("b1", "HOLIDAY").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_list_video_files_suffix() {
        let storage = MockStorage::new();
        storage.insert("b1", "v1/master.m3u8", b"m").await;
        storage.insert("b1", "v1/480p/playlist.m3u8", b"p").await;
        storage.insert("b1", "v1/480p/segment_000.ts", b"s").await;
        storage.insert("b1", "v1/notes.txt", b"n").await;
        storage.insert("b1", "v2/master.m3u8", b"m").await;

        let all = storage.list_video_files("b1", None, 100, None).await.unwrap();
        assert_eq!(all.len(), 4);

        let manifests = storage
            .list_video_files("b1", None, 100, Some("master.m3u8"))
            .await
            .unwrap();
        let names: Vec<&str> = manifests.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["v1/master.m3u8", "v2/master.m3u8"]);

        let capped = storage.list_video_files("b1", None, 1, None).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn test_list_folder() {
        let storage = MockStorage::new();
        storage.insert("b1", "v1/master.m3u8", b"m").await;
        storage.insert("b1", "v1/480p/segment_000.ts", b"s").await;
        storage.insert("b1", "v1/720p/segment_000.ts", b"s").await;

        let listing = storage.list_folder("b1", "/v1/").await.unwrap();
        assert_eq!(listing.folders, vec!["v1/480p/", "v1/720p/"]);
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].file_name, "v1/master.m3u8");
    }
}
