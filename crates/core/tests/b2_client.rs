//! B2 client integration tests against a local mock HTTP server.

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tempfile::TempDir;

use vodsync_core::{B2Client, ObjectStorage, StorageConfig, StorageError, StorageSession};

const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

fn config(server: &ServerGuard) -> StorageConfig {
    StorageConfig::new(server.url(), "key-id", "app-key")
}

fn session(server: &ServerGuard, token: &str) -> StorageSession {
    StorageSession {
        account_id: "acc-1".to_string(),
        api_url: server.url(),
        authorization_token: token.to_string(),
        download_url: server.url(),
    }
}

fn file_json(name: &str) -> serde_json::Value {
    json!({
        "fileId": format!("id-{}", name),
        "fileName": name,
        "contentLength": 5,
        "contentSha1": HELLO_SHA1,
        "contentType": "video/mp2t",
        "uploadTimestamp": 1_700_000_000_000i64,
        "action": "upload"
    })
}

async fn mock_authorize(server: &mut ServerGuard, token: &str) -> mockito::Mock {
    let body = json!({
        "accountId": "acc-1",
        "apiUrl": server.url(),
        "authorizationToken": token,
        "downloadUrl": server.url(),
    });
    server
        .mock("GET", "/b2api/v2/b2_authorize_account")
        .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

async fn mock_upload_slot(
    server: &mut ServerGuard,
    api_token: &str,
    path: &str,
    upload_token: &str,
) -> mockito::Mock {
    let body = json!({
        "bucketId": "b1",
        "uploadUrl": format!("{}{}", server.url(), path),
        "authorizationToken": upload_token,
    });
    server
        .mock("POST", "/b2api/v2/b2_get_upload_url")
        .match_header("authorization", api_token)
        .match_body(Matcher::Json(json!({"bucketId": "b1"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .expect(1)
        .create_async()
        .await
}

fn unauthorized() -> String {
    json!({"status": 401, "code": "expired_auth_token", "message": "Authorization token has expired"})
        .to_string()
}

fn write_segment(temp: &TempDir) -> std::path::PathBuf {
    let path = temp.path().join("segment_000.ts");
    std::fs::write(&path, b"hello").unwrap();
    path
}

#[tokio::test]
async fn test_authenticate_stores_session() {
    let mut server = Server::new_async().await;
    let auth = mock_authorize(&mut server, "fresh").await;

    let client = B2Client::new(config(&server)).unwrap();
    assert!(client.session().await.is_none());

    let session = client.authenticate().await.unwrap();
    assert_eq!(session.authorization_token, "fresh");
    assert_eq!(session.api_url, server.url());
    assert_eq!(client.session().await, Some(session));

    auth.assert_async().await;
}

#[tokio::test]
async fn test_authenticate_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/b2api/v2/b2_authorize_account")
        .with_status(401)
        .with_body(json!({"code": "bad_auth_token", "message": "bad key"}).to_string())
        .create_async()
        .await;

    let client = B2Client::new(config(&server)).unwrap();
    let err = client.authenticate().await.unwrap_err();

    assert!(matches!(err, StorageError::Auth(_)));
    assert!(err.to_string().contains("bad key"));
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn test_upload_declares_sha1_and_length() {
    let mut server = Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let local = write_segment(&temp);

    let auth = mock_authorize(&mut server, "tok").await;
    let slot = mock_upload_slot(&mut server, "tok", "/upload/1", "up-1").await;
    let upload = server
        .mock("POST", "/upload/1")
        .match_header("authorization", "up-1")
        .match_header("x-bz-file-name", "v1/480p/segment_000.ts")
        .match_header("x-bz-content-sha1", HELLO_SHA1)
        .match_header("content-type", "video/mp2t")
        .match_header("content-length", "5")
        .match_body("hello")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(file_json("v1/480p/segment_000.ts").to_string())
        .expect(1)
        .create_async()
        .await;

    let client = B2Client::new(config(&server)).unwrap();
    let info = client
        .upload_file("b1", "v1/480p/segment_000.ts", &local)
        .await
        .unwrap();

    assert_eq!(info.file_id.as_deref(), Some("id-v1/480p/segment_000.ts"));
    assert_eq!(info.content_sha1.as_deref(), Some(HELLO_SHA1));

    auth.assert_async().await;
    slot.assert_async().await;
    upload.assert_async().await;
}

#[tokio::test]
async fn test_stale_session_reauthenticates_once() {
    let mut server = Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let local = write_segment(&temp);

    let rejected = server
        .mock("POST", "/b2api/v2/b2_get_upload_url")
        .match_header("authorization", "stale")
        .with_status(401)
        .with_body(unauthorized())
        .expect(1)
        .create_async()
        .await;
    let auth = mock_authorize(&mut server, "fresh").await;
    let slot = mock_upload_slot(&mut server, "fresh", "/upload/1", "up-1").await;
    let upload = server
        .mock("POST", "/upload/1")
        .with_status(200)
        .with_body(file_json("v1/master.m3u8").to_string())
        .expect(1)
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "stale")).unwrap();
    client.upload_file("b1", "v1/master.m3u8", &local).await.unwrap();

    assert_eq!(
        client.session().await.map(|s| s.authorization_token).as_deref(),
        Some("fresh")
    );

    rejected.assert_async().await;
    auth.assert_async().await;
    slot.assert_async().await;
    upload.assert_async().await;
}

#[tokio::test]
async fn test_rejected_upload_url_resends_same_body_to_new_slot() {
    let mut server = Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let local = write_segment(&temp);

    let first_slot = mock_upload_slot(&mut server, "tok-1", "/upload/a", "up-a").await;
    let rejected = server
        .mock("POST", "/upload/a")
        .match_body("hello")
        .with_status(401)
        .with_body(unauthorized())
        .expect(1)
        .create_async()
        .await;
    let auth = mock_authorize(&mut server, "tok-2").await;
    let second_slot = mock_upload_slot(&mut server, "tok-2", "/upload/b", "up-b").await;
    let accepted = server
        .mock("POST", "/upload/b")
        .match_header("authorization", "up-b")
        .match_header("x-bz-content-sha1", HELLO_SHA1)
        .match_header("content-length", "5")
        .match_body("hello")
        .with_status(200)
        .with_body(file_json("v1/master.m3u8").to_string())
        .expect(1)
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "tok-1")).unwrap();
    let info = client.upload_file("b1", "v1/master.m3u8", &local).await.unwrap();
    assert_eq!(info.file_name, "v1/master.m3u8");

    first_slot.assert_async().await;
    rejected.assert_async().await;
    auth.assert_async().await;
    second_slot.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn test_second_rejection_is_auth_error() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/b2api/v2/b2_list_file_names")
        .with_status(401)
        .with_body(unauthorized())
        .expect(2)
        .create_async()
        .await;
    let auth = mock_authorize(&mut server, "fresh").await;

    let client = B2Client::with_session(config(&server), session(&server, "stale")).unwrap();
    let err = client.list_files("b1", None, 10).await.unwrap_err();

    assert!(matches!(err, StorageError::Auth(_)));
    auth.assert_async().await;
}

#[tokio::test]
async fn test_upload_server_error_is_upload_error() {
    let mut server = Server::new_async().await;
    let temp = TempDir::new().unwrap();
    let local = write_segment(&temp);

    let _slot = mock_upload_slot(&mut server, "tok", "/upload/1", "up-1").await;
    server
        .mock("POST", "/upload/1")
        .with_status(503)
        .with_body(json!({"code": "service_unavailable", "message": "busy"}).to_string())
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "tok")).unwrap();
    let err = client
        .upload_file("b1", "v1/master.m3u8", &local)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Upload { ref key, .. } if key == "v1/master.m3u8"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_search_by_name_walks_pages() {
    let mut server = Server::new_async().await;

    let first = server
        .mock("POST", "/b2api/v2/b2_list_file_names")
        .match_body(Matcher::Json(json!({"bucketId": "b1", "maxFileCount": 1000})))
        .with_status(200)
        .with_body(
            json!({
                "files": [file_json("Holiday/master.m3u8"), file_json("misc/a.txt")],
                "nextFileName": "misc/b.txt"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", "/b2api/v2/b2_list_file_names")
        .match_body(Matcher::Json(json!({
            "bucketId": "b1",
            "maxFileCount": 1000,
            "startFileName": "misc/b.txt"
        })))
        .with_status(200)
        .with_body(
            json!({
                "files": [file_json("misc/b.txt"), file_json("misc/holiday.mp4")],
                "nextFileName": null
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "tok")).unwrap();
    let found = client.search_by_name("b1", "HOLIDAY").await.unwrap();

    let names: Vec<&str> = found.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["Holiday/master.m3u8", "misc/holiday.mp4"]);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_list_folder_splits_folders_and_files() {
    let mut server = Server::new_async().await;

    let listing = server
        .mock("POST", "/b2api/v2/b2_list_file_names")
        .match_body(Matcher::Json(json!({
            "bucketId": "b1",
            "maxFileCount": 1000,
            "prefix": "v1/",
            "delimiter": "/"
        })))
        .with_status(200)
        .with_body(
            json!({
                "files": [
                    {"fileName": "v1/480p/", "action": "folder"},
                    file_json("v1/master.m3u8")
                ],
                "nextFileName": null
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "tok")).unwrap();
    let folder = client.list_folder("b1", "/v1").await.unwrap();

    assert_eq!(folder.folders, vec!["v1/480p/"]);
    assert_eq!(folder.files.len(), 1);
    assert_eq!(folder.files[0].file_name, "v1/master.m3u8");

    listing.assert_async().await;
}

#[tokio::test]
async fn test_search_by_prefix_sends_prefix() {
    let mut server = Server::new_async().await;

    let listing = server
        .mock("POST", "/b2api/v2/b2_list_file_names")
        .match_body(Matcher::Json(json!({
            "bucketId": "b1",
            "maxFileCount": 50,
            "prefix": "v1/"
        })))
        .with_status(200)
        .with_body(json!({"files": [file_json("v1/master.m3u8")]}).to_string())
        .expect(1)
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "tok")).unwrap();
    let files = client.search_by_prefix("b1", "v1/", 50).await.unwrap();

    assert_eq!(files.len(), 1);
    listing.assert_async().await;
}

#[tokio::test]
async fn test_download_file() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/file/videos/v1/master.m3u8")
        .match_header("authorization", "tok")
        .with_status(200)
        .with_body("#EXTM3U\n")
        .create_async()
        .await;
    server
        .mock("GET", "/file/videos/v1/missing.m3u8")
        .with_status(404)
        .with_body(json!({"code": "not_found", "message": "File not present"}).to_string())
        .create_async()
        .await;

    let client = B2Client::with_session(config(&server), session(&server, "tok")).unwrap();

    let bytes = client.download_file("videos", "v1/master.m3u8").await.unwrap();
    assert_eq!(bytes, b"#EXTM3U\n");

    let err = client
        .download_file("videos", "v1/missing.m3u8")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_download_url_authorizes_lazily() {
    let mut server = Server::new_async().await;
    let auth = mock_authorize(&mut server, "tok").await;

    let client = B2Client::new(config(&server)).unwrap();
    let url = client
        .get_download_url_with_token("v1/480p/playlist.m3u8", "videos")
        .await
        .unwrap();

    assert_eq!(
        url,
        format!("{}/file/videos/v1/480p/playlist.m3u8?Authorization=tok", server.url())
    );
    auth.assert_async().await;
}
