//! HTTP-level tests for the file routes

use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use filestore_server::{build_router, AppState, Config};

fn server_with(config: Config) -> TestServer {
    TestServer::new(build_router(AppState::new(config))).unwrap()
}

fn server() -> TestServer {
    server_with(Config::default())
}

/// 1000 bytes of printable text
fn sample_file() -> Vec<u8> {
    (0..1000u32).map(|i| b'a' + (i % 26) as u8).collect()
}

fn file_form(name: &str, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(bytes).file_name(name))
}

fn chunk_form(name: &str, index: u64, bytes: Vec<u8>) -> MultipartForm {
    MultipartForm::new()
        .add_text("chunknumber", index.to_string())
        .add_part("file", Part::bytes(bytes).file_name(name))
}

async fn upload_chunks(server: &TestServer, name: &str, data: &[u8], chunk_size: usize) -> u64 {
    for (i, piece) in data.chunks(chunk_size).enumerate() {
        server
            .post(&format!("/files/chunk/{}", name))
            .multipart(chunk_form(name, i as u64 + 1, piece.to_vec()))
            .await
            .assert_status_ok();
    }
    data.len() as u64
}

#[tokio::test]
async fn test_upload_download_delete() {
    let server = server();
    let data = sample_file();

    server
        .post("/files")
        .multipart(file_form("1k.txt", data.clone()))
        .await
        .assert_status_ok();

    let response = server.get("/files/1k.txt").await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), data.as_slice());
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        HeaderValue::from_static("attachment;filename=1k.txt")
    );

    let size: Value = server.get("/files/1k.txt/size").await.json();
    assert_eq!(size, json!({ "fileSize": 1000 }));

    server.delete("/files/1k.txt").await.assert_status_ok();
    server
        .get("/files/1k.txt")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/files/1k.txt")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_file_size() {
    let server = server();
    server
        .get("/files/nothing.bin/size")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_under_explicit_name() {
    let server = server();

    server
        .post("/files/renamed.txt")
        .multipart(file_form("original.txt", b"payload".to_vec()))
        .await
        .assert_status_ok();

    let response = server.get("/files/renamed.txt").await;
    assert_eq!(response.as_bytes().as_ref(), b"payload");
    server
        .get("/files/original.txt")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_files_named_like_route_segments() {
    let server = server();

    server
        .post("/files")
        .multipart(file_form("chunk", b"twelve bytes".to_vec()))
        .await
        .assert_status_ok();

    let size: Value = server.get("/files/chunk/size").await.json();
    assert_eq!(size, json!({ "fileSize": 12 }));

    let info: Value = server.get("/files/chunk/info").await.json();
    assert_eq!(info, json!([{ "index": 1, "size": 12, "chunkSize": 12 }]));

    server
        .get("/files/assemble/info")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post("/files/assemble")
        .multipart(file_form("assemble", b"abc".to_vec()))
        .await
        .assert_status_ok();
    let size: Value = server.get("/files/assemble/size").await.json();
    assert_eq!(size, json!({ "fileSize": 3 }));

    server
        .get("/files/chunk/other")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Download and delete are unaffected
    assert_eq!(server.get("/files/chunk").await.as_bytes().as_ref(), b"twelve bytes");
    server.delete("/files/chunk").await.assert_status_ok();
}

#[tokio::test]
async fn test_chunked_upload_and_assembly() {
    let server = server();
    let data = sample_file();
    let total = upload_chunks(&server, "1k.txt", &data, 200).await;

    let info: Value = server.get("/files/1k.txt/info").await.json();
    assert_eq!(info.as_array().unwrap().len(), 5);
    assert_eq!(info[0], json!({ "index": 1, "size": 200, "chunkSize": 200 }));

    server
        .post("/files/assemble/1k.txt")
        .json(&json!({ "totalsize": total - 1 }))
        .expect_failure()
        .await
        .assert_status(StatusCode::PRECONDITION_FAILED);

    server
        .post("/files/assemble/1k.txt")
        .json(&json!({ "filename": "1k.txt", "totalsize": total }))
        .await
        .assert_status_ok();

    let response = server.get("/files/1k.txt").await;
    assert_eq!(response.as_bytes().as_ref(), data.as_slice());

    let info: Value = server.get("/files/1k.txt/info").await.json();
    assert_eq!(info, json!([{ "index": 1, "size": 1000, "chunkSize": 1000 }]));
}

#[tokio::test]
async fn test_chunk_info_progress() {
    let server = server();

    server
        .get("/files/f/info")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);

    for (index, size) in [(1u64, 200usize), (2, 200), (3, 24)] {
        server
            .post("/files/chunk/f")
            .multipart(chunk_form("f", index, vec![0u8; size]))
            .await
            .assert_status_ok();
    }

    let info: Value = server.get("/files/f/info").await.json();
    assert_eq!(
        info,
        json!([
            { "index": 1, "size": 200, "chunkSize": 200 },
            { "index": 2, "size": 200, "chunkSize": 200 },
            { "index": 3, "size": 24, "chunkSize": 24 },
        ])
    );

    server
        .post("/files/assemble/f")
        .json(&json!({ "totalsize": 424 }))
        .await
        .assert_status_ok();

    let info: Value = server.get("/files/f/info").await.json();
    assert_eq!(info, json!([{ "index": 1, "size": 424, "chunkSize": 424 }]));
}

#[tokio::test]
async fn test_assemble_with_form_body() {
    let server = server();
    upload_chunks(&server, "doc.pdf", b"hello world", 4).await;

    server
        .post("/files/assemble/doc.pdf")
        .form(&[("totalsize", "11")])
        .await
        .assert_status_ok();

    let response = server.get("/files/doc.pdf").await;
    assert_eq!(response.as_bytes().as_ref(), b"hello world");
}

#[tokio::test]
async fn test_assemble_without_chunks() {
    let server = server();
    server
        .post("/files/assemble/ghost.bin")
        .json(&json!({ "totalsize": 10 }))
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_chunk_requests() {
    let server = server();

    server
        .post("/files/chunk/f")
        .multipart(chunk_form("f", 0, b"x".to_vec()))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/files/chunk/f")
        .multipart(file_form("f", b"x".to_vec()))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/files/assemble/f")
        .json(&json!({ "wrong": 1 }))
        .expect_failure()
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_custom_route_and_fields() {
    let mut config = Config::default();
    config.server.route = "uploads".to_string();
    config.upload.chunk_number_field = "part".to_string();
    config.upload.total_size_field = "length".to_string();
    let server = server_with(config);

    server
        .post("/uploads/chunk/x.bin")
        .multipart(
            MultipartForm::new()
                .add_text("part", "1")
                .add_part("file", Part::bytes(b"abc".to_vec()).file_name("x.bin")),
        )
        .await
        .assert_status_ok();

    server
        .post("/uploads/assemble/x.bin")
        .json(&json!({ "length": "3" }))
        .await
        .assert_status_ok();

    let response = server.get("/uploads/x.bin").await;
    assert_eq!(response.as_bytes().as_ref(), b"abc");
}

#[tokio::test]
async fn test_slow_upload() {
    let server = server();
    let data = sample_file();

    let start = Instant::now();
    server
        .post("/files")
        .add_query_param("wait", 20)
        .add_query_param("chunkSize", 100)
        .multipart(file_form("slow.txt", data.clone()))
        .await
        .assert_status_ok();

    // 100 byte slices with a pause after each, plus the response delay
    assert!(start.elapsed() >= Duration::from_millis(100));

    let response = server.get("/files/slow.txt").await;
    assert_eq!(response.as_bytes().as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_postmessage_response() {
    let server = server();

    let response = server
        .post("/files")
        .add_query_param("_postmessage", 1)
        .add_query_param("_postmessageid", "42")
        .multipart(file_form("pm.txt", b"x".to_vec()))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.text(),
        "<!DOCTYPE html><script>parent.postMessage(JSON.stringify({\"_postmessageid\":\"42\"}), '*');</script>"
    );
}

#[tokio::test]
async fn test_disk_backed_upload() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.upload.upload_dir = Some(temp_dir.path().to_path_buf());
    let server = server_with(config);

    server
        .post("/files")
        .multipart(file_form("big.bin", vec![9u8; 4096]))
        .await
        .assert_status_ok();

    let spooled: Vec<_> = std::fs::read_dir(temp_dir.path()).unwrap().collect();
    assert_eq!(spooled.len(), 1);

    let size: Value = server.get("/files/big.bin/size").await.json();
    assert_eq!(size, json!({ "fileSize": 4096 }));
    let response = server.get("/files/big.bin").await;
    assert_eq!(response.as_bytes().len(), 4096);

    server.delete("/files/big.bin").await.assert_status_ok();
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_truncated_disk_upload_leaves_no_spool_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.upload.upload_dir = Some(temp_dir.path().to_path_buf());
    let server = server_with(config);

    // The file part never reaches its closing boundary
    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"cut.bin\"\r\n\
        \r\n\
        partial contents";
    server
        .post("/files")
        .content_type("multipart/form-data; boundary=XBOUNDARY")
        .bytes(Bytes::from_static(body.as_bytes()))
        .expect_failure()
        .await;

    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    server
        .get("/files/cut.bin")
        .expect_failure()
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_required() {
    let mut config = Config::default();
    config.auth.use_token = true;
    let server = server_with(config);

    server
        .post("/files")
        .multipart(file_form("1k.txt", sample_file()))
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let issued: Value = server.get("/token").await.json();
    let token = issued["data"]["token"].as_str().unwrap().to_string();

    server
        .post("/files")
        .add_header(header::AUTHORIZATION, HeaderValue::from_str(&token).unwrap())
        .multipart(file_form("1k.txt", sample_file()))
        .await
        .assert_status_ok();

    server
        .get("/files/1k.txt")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_expired_token() {
    let mut config = Config::default();
    config.auth.use_token = true;
    let server = server_with(config);

    let issued: Value = server
        .get("/token")
        .add_query_param("expiresIn", -10)
        .await
        .json();
    let token = issued["data"]["token"].as_str().unwrap().to_string();

    server
        .get("/files/anything")
        .add_header(header::AUTHORIZATION, HeaderValue::from_str(&token).unwrap())
        .expect_failure()
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let server = server();
    let health: Value = server.get("/health").await.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["files"], 0);
}
