//! Whole sessions driven through `UploadController` + `HttpService` against a
//! mock translation server.

use pdf_translate_client::{
    ClientConfig, HttpService, Phase, SelectedFile, SessionError, UploadController,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const POLL: Duration = Duration::from_millis(50);

/// `RUST_LOG=pdf_translate_client=debug cargo test --test session_flow -- --nocapture`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn controller_for(server: &MockServer) -> UploadController {
    init_tracing();
    let config = ClientConfig::builder()
        .base_url(server.uri())
        .poll_interval(POLL)
        .submit_delay(Duration::from_millis(10))
        .request_timeout_secs(5)
        .build()
        .unwrap();
    let service = Arc::new(HttpService::new(&config).unwrap());
    UploadController::new(service, config)
}

async fn mount_upload(server: &MockServer, task_id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": task_id,
            "message": "File uploaded successfully, processing started"
        })))
        .mount(server)
        .await;
}

async fn settle(c: &UploadController) -> pdf_translate_client::SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(10), c.wait_until_settled())
        .await
        .expect("session did not settle")
}

async fn status_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/api/status/"))
        .count()
}

fn pdf(name: &str) -> SelectedFile {
    SelectedFile::new(name, b"%PDF-1.7 fake".to_vec())
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_poll_complete_and_download() {
    let server = MockServer::start().await;
    mount_upload(&server, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/status/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing", "progress": 30.0, "message": "Translating"
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed", "progress": 100.0
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/download/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF translated".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let c = controller_for(&server);
    let mut rx = c.subscribe();
    c.select_file(pdf("doc.pdf")).unwrap();

    let polling = tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|s| s.progress_percent == 30),
    )
    .await
    .unwrap()
    .unwrap()
    .clone();
    assert_eq!(polling.phase, Phase::Polling);
    assert_eq!(polling.last_message, "Translating");

    let done = settle(&c).await;
    assert_eq!(done.phase, Phase::Completed);
    assert_eq!(done.progress_percent, 100);
    assert_eq!(done.task_id.as_ref().map(|t| t.as_str()), Some("t1"));
    assert!(!c.poll_active());

    let dir = tempfile::tempdir().unwrap();
    let saved = c.download().await.unwrap().save_to(dir.path()).await.unwrap();
    assert_eq!(saved, dir.path().join("translated_doc.pdf"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF translated");
}

#[tokio::test]
async fn upload_rejected_by_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "server busy"})))
        .mount(&server)
        .await;

    let c = controller_for(&server);
    c.select_file(pdf("doc.pdf")).unwrap();
    let done = settle(&c).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(done.last_message, "server busy");
    assert!(done.task_id.is_none());
    assert_eq!(status_requests(&server).await, 0);
}

#[tokio::test]
async fn upload_rejected_with_empty_detail_shows_generic_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": ""})))
        .mount(&server)
        .await;

    let c = controller_for(&server);
    c.select_file(pdf("doc.pdf")).unwrap();
    let done = settle(&c).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(done.last_message, "An error occurred while uploading the file.");
    assert!(matches!(
        done.error,
        Some(SessionError::Submission { ref message }) if !message.is_empty()
    ));
}

#[tokio::test]
async fn status_endpoint_error_fails_the_session() {
    let server = MockServer::start().await;
    mount_upload(&server, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/status/t1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let c = controller_for(&server);
    c.select_file(pdf("doc.pdf")).unwrap();
    let done = settle(&c).await;

    assert_eq!(done.phase, Phase::Failed);
    assert!(matches!(done.error, Some(SessionError::StatusCheck { .. })));
    assert_eq!(
        done.last_message,
        "An error occurred while checking the status."
    );

    let checks = status_requests(&server).await;
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(status_requests(&server).await, checks);
}

#[tokio::test]
async fn status_body_without_status_field_fails_the_session() {
    let server = MockServer::start().await;
    mount_upload(&server, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/status/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"progress": 50.0})))
        .mount(&server)
        .await;

    let c = controller_for(&server);
    c.select_file(pdf("doc.pdf")).unwrap();
    let done = settle(&c).await;

    assert_eq!(done.phase, Phase::Failed);
    assert!(matches!(done.error, Some(SessionError::StatusCheck { .. })));
    assert_eq!(status_requests(&server).await, 1);
}

#[tokio::test]
async fn server_reported_failure() {
    let server = MockServer::start().await;
    mount_upload(&server, "t1").await;
    Mock::given(method("GET"))
        .and(path("/api/status/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed", "progress": 0.0, "error": "Unsupported PDF encryption"
        })))
        .mount(&server)
        .await;

    let c = controller_for(&server);
    c.select_file(pdf("doc.pdf")).unwrap();
    let done = settle(&c).await;

    assert_eq!(done.phase, Phase::Failed);
    assert_eq!(done.last_message, "Unsupported PDF encryption");
}

#[tokio::test]
async fn reset_stops_polling_and_allows_a_new_session() {
    let server = MockServer::start().await;
    mount_upload(&server, "t1").await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/status/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "processing", "progress": 10.0
        })))
        .mount(&server)
        .await;

    let c = controller_for(&server);
    let mut rx = c.subscribe();
    c.select_file(pdf("doc.pdf")).unwrap();
    tokio::time::timeout(
        Duration::from_secs(10),
        rx.wait_for(|s| s.progress_percent == 10),
    )
    .await
    .unwrap()
    .unwrap();

    c.reset();
    assert_eq!(c.phase(), Phase::Idle);
    assert!(!c.poll_active());

    // Let any request that was already on the wire land, then verify silence.
    tokio::time::sleep(POLL * 2).await;
    let checks = status_requests(&server).await;
    tokio::time::sleep(POLL * 6).await;
    assert_eq!(status_requests(&server).await, checks);
    assert_eq!(c.snapshot().progress_percent, 0);

    c.select_file(pdf("second.pdf")).unwrap();
    assert_eq!(c.phase(), Phase::FileSelected);
    c.reset();
}

#[tokio::test]
async fn invalid_files_never_reach_the_server() {
    let server = MockServer::start().await;
    let c = controller_for(&server);

    assert!(c.select_file(pdf("notes.txt")).is_err());
    let big = SelectedFile::new("big.pdf", vec![0u8; 50 * 1024 * 1024 + 1]);
    assert!(c.select_file(big).is_err());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(c.phase(), Phase::Idle);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
