//! Backblaze B2 client implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::metrics;

use super::config::StorageConfig;
use super::error::StorageError;
use super::traits::ObjectStorage;
use super::types::{content_type_for, FileInfo, FileListPage, FolderListing, StorageSession, UploadSlot, LIST_PAGE_SIZE};

/// B2 native API client.
pub struct B2Client {
    client: Client,
    config: StorageConfig,
    /// Current session (cleared when the API rejects its token).
    session: Arc<RwLock<Option<StorageSession>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeResponse {
    account_id: String,
    api_url: String,
    authorization_token: String,
    download_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetUploadUrlRequest<'a> {
    bucket_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListFileNamesRequest<'a> {
    bucket_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_file_name: Option<&'a str>,
    max_file_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delimiter: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListFileNamesResponse {
    #[serde(default)]
    files: Vec<FileInfo>,
    #[serde(default)]
    next_file_name: Option<String>,
    #[serde(default)]
    common_prefixes: Vec<String>,
}

impl B2Client {
    /// Create a new B2 client. No request is made until first use.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Create a client around an existing session.
    pub fn with_session(config: StorageConfig, session: StorageSession) -> Result<Self, StorageError> {
        let client = Self::new(config)?;
        Ok(Self {
            session: Arc::new(RwLock::new(Some(session))),
            ..client
        })
    }

    /// Current session, if one is established.
    pub async fn session(&self) -> Option<StorageSession> {
        self.session.read().await.clone()
    }

    /// Configuration in use.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn auth_base_url(&self) -> &str {
        self.config.api_url.trim_end_matches('/')
    }

    /// Exchanges the key pair for a session and stores it.
    async fn authorize(&self) -> Result<StorageSession, StorageError> {
        let url = format!("{}/b2api/v2/b2_authorize_account", self.auth_base_url());
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.application_key))
            .send()
            .await?;

        observe("authorize", start);

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let err = api_error(response).await;
            return Err(StorageError::Auth(err.to_string()));
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let body: AuthorizeResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Decode(e.to_string()))?;

        let session = StorageSession {
            account_id: body.account_id,
            api_url: body.api_url.trim_end_matches('/').to_string(),
            authorization_token: body.authorization_token,
            download_url: body.download_url.trim_end_matches('/').to_string(),
        };

        debug!(account_id = %session.account_id, "B2 authorization successful");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// Returns the current session, authorizing first if there is none.
    async fn ensure_session(&self) -> Result<StorageSession, StorageError> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }
        self.authorize().await
    }

    /// Drops the rejected session and authorizes again.
    async fn reauthorize(&self, operation: &str) -> Result<StorageSession, StorageError> {
        warn!(operation, "B2 session rejected, re-authenticating");
        metrics::REAUTHENTICATIONS.inc();
        *self.session.write().await = None;
        self.authorize().await
    }

    async fn post_api<B: Serialize + ?Sized>(
        &self,
        session: &StorageSession,
        operation: &str,
        body: &B,
    ) -> Result<Response, StorageError> {
        let url = format!("{}/b2api/v2/{}", session.api_url, operation);
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("Authorization", &session.authorization_token)
            .json(body)
            .send()
            .await?;
        observe(operation, start);
        Ok(response)
    }

    /// Makes an authenticated API call, re-authenticating once on 401.
    async fn api_call<B, R>(&self, operation: &str, body: &B) -> Result<R, StorageError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let session = self.ensure_session().await?;
        let mut response = self.post_api(&session, operation, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let session = self.reauthorize(operation).await?;
            response = self.post_api(&session, operation, body).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                let err = api_error(response).await;
                return Err(StorageError::Auth(err.to_string()));
            }
        }

        parse_json(response).await
    }

    async fn get_upload_slot(&self, bucket_id: &str) -> Result<UploadSlot, StorageError> {
        self.api_call("b2_get_upload_url", &GetUploadUrlRequest { bucket_id })
            .await
    }

    async fn send_upload(
        &self,
        slot: &UploadSlot,
        remote_key: &str,
        content_type: &str,
        sha1: &str,
        data: Bytes,
    ) -> Result<Response, StorageError> {
        let start = Instant::now();
        let length = data.len();
        let response = self
            .client
            .post(&slot.upload_url)
            .header("Authorization", &slot.authorization_token)
            .header("X-Bz-File-Name", encode_key(remote_key))
            .header("Content-Type", content_type)
            .header("Content-Length", length)
            .header("X-Bz-Content-Sha1", sha1)
            .body(data)
            .send()
            .await
            .map_err(|e| StorageError::upload(remote_key, e.to_string()))?;
        observe("b2_upload_file", start);
        Ok(response)
    }

    async fn list_page(&self, request: &ListFileNamesRequest<'_>) -> Result<ListFileNamesResponse, StorageError> {
        self.api_call("b2_list_file_names", request).await
    }

    async fn get_download(&self, session: &StorageSession, bucket_name: &str, remote_key: &str) -> Result<Response, StorageError> {
        let url = format!("{}/file/{}/{}", session.download_url, bucket_name, encode_key(remote_key));
        let start = Instant::now();
        let response = self
            .client
            .get(&url)
            .header("Authorization", &session.authorization_token)
            .send()
            .await?;
        observe("download", start);
        Ok(response)
    }
}

/// Percent-encodes each path segment of a key, keeping `/` separators.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn observe(operation: &str, start: Instant) {
    metrics::STORAGE_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
}

/// Converts an error response into a typed error.
async fn api_error(response: Response) -> StorageError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => StorageError::Api {
            status,
            code: body.code,
            message: body.message,
        },
        Err(_) => StorageError::Api {
            status,
            code: "unknown".to_string(),
            message: text.chars().take(200).collect(),
        },
    }
}

async fn parse_json<R: DeserializeOwned>(response: Response) -> Result<R, StorageError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    response
        .json()
        .await
        .map_err(|e| StorageError::Decode(e.to_string()))
}

fn folder_prefix(folder_path: &str) -> String {
    let trimmed = folder_path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

#[async_trait]
impl ObjectStorage for B2Client {
    fn name(&self) -> &str {
        "b2"
    }

    async fn authenticate(&self) -> Result<StorageSession, StorageError> {
        self.authorize().await
    }

    async fn upload_file(
        &self,
        bucket_id: &str,
        remote_key: &str,
        local_path: &Path,
    ) -> Result<FileInfo, StorageError> {
        let data = tokio::fs::read(local_path)
            .await
            .map(Bytes::from)
            .map_err(|e| StorageError::Io {
                path: local_path.to_path_buf(),
                source: e,
            })?;
        let sha1 = format!("{:x}", Sha1::digest(&data[..]));
        let content_type = content_type_for(local_path);
        let size = data.len() as u64;

        debug!(remote_key, bucket_id, size, "Uploading file");

        let slot = self.get_upload_slot(bucket_id).await?;
        // Bytes clones share one buffer with the retry
        let mut response = self
            .send_upload(&slot, remote_key, content_type, &sha1, data.clone())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.reauthorize("b2_upload_file").await?;
            let slot = self.get_upload_slot(bucket_id).await?;
            response = self
                .send_upload(&slot, remote_key, content_type, &sha1, data)
                .await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                let err = api_error(response).await;
                return Err(StorageError::Auth(err.to_string()));
            }
        }

        let info: FileInfo = parse_json(response).await.map_err(|e| match e {
            StorageError::Api { .. } | StorageError::Decode(_) => {
                StorageError::upload(remote_key, e.to_string())
            }
            other => other,
        })?;

        metrics::BYTES_UPLOADED.inc_by(size);
        Ok(info)
    }

    async fn download_file(&self, bucket_name: &str, remote_key: &str) -> Result<Vec<u8>, StorageError> {
        let session = self.ensure_session().await?;
        let mut response = self.get_download(&session, bucket_name, remote_key).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let session = self.reauthorize("download").await?;
            response = self.get_download(&session, bucket_name, remote_key).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                let err = api_error(response).await;
                return Err(StorageError::Auth(err.to_string()));
            }
        }

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<FileListPage, StorageError> {
        let page = self
            .list_page(&ListFileNamesRequest {
                bucket_id,
                start_file_name: cursor,
                max_file_count: page_size,
                prefix: None,
                delimiter: None,
            })
            .await?;

        Ok(FileListPage {
            files: page.files,
            next_cursor: page.next_file_name,
        })
    }

    async fn search_by_prefix(
        &self,
        bucket_id: &str,
        prefix: &str,
        max: u32,
    ) -> Result<Vec<FileInfo>, StorageError> {
        let page = self
            .list_page(&ListFileNamesRequest {
                bucket_id,
                start_file_name: None,
                max_file_count: max,
                prefix: Some(prefix),
                delimiter: None,
            })
            .await?;

        Ok(page.files)
    }

    async fn list_folder(&self, bucket_id: &str, folder_path: &str) -> Result<FolderListing, StorageError> {
        let prefix = folder_prefix(folder_path);
        let mut listing = FolderListing::default();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .list_page(&ListFileNamesRequest {
                    bucket_id,
                    start_file_name: cursor.as_deref(),
                    max_file_count: LIST_PAGE_SIZE,
                    prefix: Some(&prefix),
                    delimiter: Some("/"),
                })
                .await?;

            for file in page.files {
                if file.is_folder() {
                    listing.folders.push(file.file_name);
                } else {
                    listing.files.push(file);
                }
            }
            for common in page.common_prefixes {
                if !listing.folders.contains(&common) {
                    listing.folders.push(common);
                }
            }

            match page.next_file_name {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(listing)
    }

    async fn get_download_url_with_token(
        &self,
        remote_key: &str,
        bucket_name: &str,
    ) -> Result<String, StorageError> {
        let session = self.ensure_session().await?;
        Ok(format!(
            "{}/file/{}/{}?Authorization={}",
            session.download_url,
            bucket_name,
            encode_key(remote_key),
            urlencoding::encode(&session.authorization_token)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key_keeps_separators() {
        assert_eq!(encode_key("v123/480p/segment_000.ts"), "v123/480p/segment_000.ts");
        assert_eq!(encode_key("my video/clip #1.mp4"), "my%20video/clip%20%231.mp4");
    }

    #[test]
    fn test_folder_prefix() {
        assert_eq!(folder_prefix(""), "");
        assert_eq!(folder_prefix("/"), "");
        assert_eq!(folder_prefix("v1"), "v1/");
        assert_eq!(folder_prefix("/v1/480p/"), "v1/480p/");
    }

    #[test]
    fn test_list_request_omits_absent_fields() {
        let request = ListFileNamesRequest {
            bucket_id: "b1",
            start_file_name: None,
            max_file_count: 1000,
            prefix: None,
            delimiter: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"bucketId": "b1", "maxFileCount": 1000}));
    }

    #[tokio::test]
    async fn test_with_session_exposes_session() {
        let session = StorageSession {
            account_id: "acc".to_string(),
            api_url: "http://127.0.0.1:1".to_string(),
            authorization_token: "tok en".to_string(),
            download_url: "http://127.0.0.1:2".to_string(),
        };
        let client = B2Client::with_session(
            StorageConfig::new("http://127.0.0.1:1", "id", "key"),
            session.clone(),
        )
        .unwrap();

        assert_eq!(client.session().await, Some(session));

        // Existing session is used without a round-trip
        let url = client
            .get_download_url_with_token("v1/master.m3u8", "videos")
            .await
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:2/file/videos/v1/master.m3u8?Authorization=tok%20en");
    }
}
