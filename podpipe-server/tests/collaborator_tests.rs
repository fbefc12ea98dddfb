//! Storage and CMS client tests against in-process fake services
//!
//! Each fake is a tiny axum router bound to an ephemeral port, recording
//! the calls and headers it sees so tests can assert on the wire protocol.

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use podpipe_common::events::{PipelineEvent, ProgressSender};
use podpipe_server::error::PipelineError;
use podpipe_server::models::ServiceAccount;
use podpipe_server::pipeline::{PublishDraft, UploadStorage};
use podpipe_server::services::{CmsClient, StorageClient};

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn drain_statuses(rx: &mut tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<String> {
    let mut messages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::Status { message } = event {
            messages.push(message);
        }
    }
    messages
}

// ---------------------------------------------------------------------------
// Fake file-hosting service
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeStorage {
    calls: Arc<Mutex<Vec<String>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
    reject_login: bool,
    reject_mkdir: bool,
}

impl FakeStorage {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn router(self) -> Router {
        Router::new()
            .route("/api/login", post(storage_login))
            .route("/api/resources/:container", post(storage_mkdir))
            .route("/api/resources/:container/:file", post(storage_upload))
            .with_state(self)
    }
}

async fn storage_login(State(fake): State<FakeStorage>, Json(body): Json<Value>) -> (StatusCode, String) {
    fake.record(format!("login:{}", body["username"].as_str().unwrap_or("")));
    if fake.reject_login {
        (
            StatusCode::FORBIDDEN,
            json!({"message": "invalid credentials"}).to_string(),
        )
    } else {
        (StatusCode::OK, "fake-session-token".to_string())
    }
}

async fn storage_mkdir(
    State(fake): State<FakeStorage>,
    UrlPath(container): UrlPath<String>,
) -> StatusCode {
    fake.record(format!("mkdir:{}", container));
    if fake.reject_mkdir {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::CREATED
    }
}

async fn storage_upload(
    State(fake): State<FakeStorage>,
    UrlPath((container, file)): UrlPath<(String, String)>,
    headers: HeaderMap,
) -> StatusCode {
    fake.record(format!("upload:{}/{}", container, file));
    if let Some(auth) = headers.get("X-Auth") {
        fake.auth_headers
            .lock()
            .unwrap()
            .push(auth.to_str().unwrap().to_string());
    }
    StatusCode::OK
}

fn storage_account(url: &str) -> ServiceAccount {
    ServiceAccount {
        url: url.to_string(),
        username: "uploader".to_string(),
        password: "s3cret".to_string(),
    }
}

#[tokio::test]
async fn storage_upload_happy_path() {
    let fake = FakeStorage::default();
    let calls = fake.calls.clone();
    let auth_headers = fake.auth_headers.clone();
    let base = spawn(fake.clone().router()).await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("2024-03-10_easter_service_.mp3");
    std::fs::write(&file_path, b"mp3 bytes").unwrap();

    let client = StorageClient::new(reqwest::Client::new());
    let (progress, mut rx) = ProgressSender::channel();
    let url = client
        .upload(
            &file_path,
            "2024-03-10_easter_service_.mp3",
            "2024",
            &storage_account(&base),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(
        url,
        format!(
            "{}/api/public/dl/2024/2024-03-10_easter_service_.mp3",
            base
        )
    );
    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "login:uploader",
            "mkdir:2024",
            "upload:2024/2024-03-10_easter_service_.mp3"
        ]
    );
    assert_eq!(*auth_headers.lock().unwrap(), vec!["fake-session-token"]);

    drop(progress);
    let statuses = drain_statuses(&mut rx);
    assert!(statuses[0].contains("Logging in"));
    assert!(statuses[1].contains("Uploading"));
}

#[tokio::test]
async fn storage_login_failure_stops_before_transfer() {
    let fake = FakeStorage {
        reject_login: true,
        ..Default::default()
    };
    let calls = fake.calls.clone();
    let base = spawn(fake.clone().router()).await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("x.mp3");
    std::fs::write(&file_path, b"mp3").unwrap();

    let client = StorageClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    let err = client
        .upload(&file_path, "x.mp3", "2024", &storage_account(&base), &progress)
        .await
        .unwrap_err();

    match err {
        PipelineError::Upload { message, detail } => {
            assert!(message.contains("login rejected"));
            assert!(detail.unwrap().contains("invalid credentials"));
        }
        other => panic!("expected Upload error, got {:?}", other),
    }

    // Only the login call went out
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn container_create_failure_is_swallowed() {
    let fake = FakeStorage {
        reject_mkdir: true,
        ..Default::default()
    };
    let calls = fake.calls.clone();
    let base = spawn(fake.clone().router()).await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("x.mp3");
    std::fs::write(&file_path, b"mp3").unwrap();

    let client = StorageClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    let url = client
        .upload(&file_path, "x.mp3", "2024", &storage_account(&base), &progress)
        .await
        .unwrap();

    assert!(url.ends_with("/api/public/dl/2024/x.mp3"));
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["login:uploader", "mkdir:2024", "upload:2024/x.mp3"]
    );
}

#[tokio::test]
async fn storage_probe_only_logs_in() {
    let fake = FakeStorage::default();
    let calls = fake.calls.clone();
    let base = spawn(fake.clone().router()).await;

    StorageClient::new(reqwest::Client::new())
        .probe(&storage_account(&base))
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["login:uploader"]);
}

// ---------------------------------------------------------------------------
// Fake content-management service
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct FakeCms {
    calls: Arc<Mutex<Vec<String>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
    created_payload: Arc<Mutex<Option<Value>>>,
    no_category: bool,
    fail_create: bool,
    fail_meta: bool,
}

impl FakeCms {
    fn record(&self, call: impl Into<String>, headers: &HeaderMap) {
        self.calls.lock().unwrap().push(call.into());
        if let Some(auth) = headers.get("authorization") {
            self.auth_headers
                .lock()
                .unwrap()
                .push(auth.to_str().unwrap().to_string());
        }
    }

    fn router(self) -> Router {
        Router::new()
            .route("/wp-json/wp/v2/users/me", get(cms_users_me))
            .route("/wp-json/wp/v2/categories", get(cms_categories))
            .route("/wp-json/wp/v2/posts", post(cms_create_post))
            .route("/wp-json/wp/v2/posts/:id", post(cms_update_post))
            .with_state(self)
    }
}

async fn cms_users_me(State(fake): State<FakeCms>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    fake.record("users/me", &headers);
    (StatusCode::OK, Json(json!({"id": 1, "name": "editor"})))
}

async fn cms_categories(State(fake): State<FakeCms>, headers: HeaderMap) -> Json<Value> {
    fake.record("categories", &headers);
    if fake.no_category {
        Json(json!([]))
    } else {
        Json(json!([{"id": 7, "name": "Podcasts"}]))
    }
}

async fn cms_create_post(
    State(fake): State<FakeCms>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.record("create-post", &headers);
    if fake.fail_create {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "Sorry, you are not allowed to do that."})),
        );
    }
    *fake.created_payload.lock().unwrap() = Some(payload);
    (
        StatusCode::CREATED,
        Json(json!({"id": 42, "link": "https://cms.example/?p=42"})),
    )
}

async fn cms_update_post(
    State(fake): State<FakeCms>,
    UrlPath(id): UrlPath<u64>,
    headers: HeaderMap,
    Json(_payload): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.record(format!("update-post:{}", id), &headers);
    if fake.fail_meta {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"message": "meta update failed"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"id": id})))
    }
}

fn cms_account(url: &str, password: &str) -> ServiceAccount {
    ServiceAccount {
        url: url.to_string(),
        username: "editor".to_string(),
        password: password.to_string(),
    }
}

fn march_10() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
}

#[tokio::test]
async fn publish_creates_draft_with_formatted_title_and_category() {
    let fake = FakeCms::default();
    let created_payload = fake.created_payload.clone();
    let calls = fake.calls.clone();
    let base = spawn(fake.clone().router()).await;

    let client = CmsClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    let post = client
        .publish(
            "Easter Service!",
            "https://cdn.example/podcasts/2024/2024-03-10_easter_service_.mp3",
            march_10(),
            &cms_account(&base, "abcd efgh"),
            &progress,
        )
        .await
        .unwrap();

    assert_eq!(post.post_id, 42);
    assert_eq!(
        post.edit_link,
        format!("{}/wp-admin/post.php?post=42&action=edit", base)
    );
    assert_eq!(post.preview_link, "https://cms.example/?p=42");

    let payload = created_payload.lock().unwrap().clone().unwrap();
    assert_eq!(
        payload["title"],
        "03/10/2024 | Easter Service! | SUNDAY SERVICE"
    );
    assert_eq!(payload["status"], "draft");
    assert_eq!(payload["date"], "2024-03-10");
    assert_eq!(payload["categories"], json!([7]));
    let content = payload["content"].as_str().unwrap();
    assert!(content.contains("<audio controls"));
    assert!(content.contains("Download MP3"));

    // Category lookup, creation, then the best-effort meta update
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["categories", "create-post", "update-post:42"]
    );
}

#[tokio::test]
async fn basic_auth_strips_app_password_whitespace() {
    let fake = FakeCms::default();
    let auth_headers = fake.auth_headers.clone();
    let base = spawn(fake.clone().router()).await;

    let client = CmsClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    client
        .publish(
            "Title",
            "https://cdn.example/x.mp3",
            march_10(),
            &cms_account(&base, "abcd efgh ijkl mnop"),
            &progress,
        )
        .await
        .unwrap();

    let expected = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("editor:abcdefghijklmnop")
    );
    for header in auth_headers.lock().unwrap().iter() {
        assert_eq!(header, &expected);
    }
}

#[tokio::test]
async fn absent_category_publishes_without_one() {
    let fake = FakeCms {
        no_category: true,
        ..Default::default()
    };
    let created_payload = fake.created_payload.clone();
    let base = spawn(fake.clone().router()).await;

    let client = CmsClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    client
        .publish(
            "Title",
            "https://cdn.example/x.mp3",
            march_10(),
            &cms_account(&base, "pw"),
            &progress,
        )
        .await
        .unwrap();

    let payload = created_payload.lock().unwrap().clone().unwrap();
    assert!(payload.get("categories").is_none());
}

#[tokio::test]
async fn meta_attach_failure_is_downgraded_to_success() {
    let fake = FakeCms {
        fail_meta: true,
        ..Default::default()
    };
    let calls = fake.calls.clone();
    let base = spawn(fake.clone().router()).await;

    let client = CmsClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    let post = client
        .publish(
            "Title",
            "https://cdn.example/x.mp3",
            march_10(),
            &cms_account(&base, "pw"),
            &progress,
        )
        .await
        .unwrap();

    // Job still reports success with the post links
    assert_eq!(post.post_id, 42);
    assert!(!post.edit_link.is_empty());
    assert!(!post.preview_link.is_empty());
    // The meta update was attempted
    assert!(calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c == "update-post:42"));
}

#[tokio::test]
async fn create_failure_is_a_publish_error_with_upstream_detail() {
    let fake = FakeCms {
        fail_create: true,
        ..Default::default()
    };
    let base = spawn(fake.clone().router()).await;

    let client = CmsClient::new(reqwest::Client::new());
    let (progress, _rx) = ProgressSender::channel();
    let err = client
        .publish(
            "Title",
            "https://cdn.example/x.mp3",
            march_10(),
            &cms_account(&base, "pw"),
            &progress,
        )
        .await
        .unwrap_err();

    match err {
        PipelineError::Publish { message, detail } => {
            assert!(message.contains("post creation rejected"));
            assert_eq!(
                detail.as_deref(),
                Some("Sorry, you are not allowed to do that.")
            );
        }
        other => panic!("expected Publish error, got {:?}", other),
    }
}

#[tokio::test]
async fn cms_probe_hits_current_user_endpoint() {
    let fake = FakeCms::default();
    let calls = fake.calls.clone();
    let base = spawn(fake.clone().router()).await;

    CmsClient::new(reqwest::Client::new())
        .probe(&cms_account(&base, "pw"))
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["users/me"]);
}
