//! Router tests against a mock platform.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use mvgen_api::{create_router, ApiConfig, AppState};
use mvgen_jobs::JobsConfig;
use mvgen_models::{
    InputAssetRef, Job, JobHandle, JobId, JobParams, JobState, RemoteState, StatusSnapshot,
};
use mvgen_platform::{PlatformClient, PlatformConfig};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "mvgen-test-boundary";

// =============================================================================
// Test Helpers
// =============================================================================

fn test_state(api_url: &str) -> AppState {
    let config = ApiConfig {
        background_polling: false,
        ..ApiConfig::default()
    };
    let platform = PlatformClient::new(PlatformConfig::new(api_url, "alice", "secret")).unwrap();
    AppState::from_parts(config, platform, JobsConfig::default(), Arc::from("print('runner')"))
}

fn router(state: &AppState) -> Router {
    create_router(state.clone(), None)
}

fn multipart(fields: &[(&str, &str)], audio: Option<(&str, &str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = audio {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

fn submit_request(body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/jobs")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mount_submission(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/datasets/status/alice/[a-z0-9-]+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/blobs/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "tok-1",
            "createUrl": format!("{}/upload/tok-1", server.uri()),
        })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload/tok-1"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/datasets/create/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"versionNumber": 1})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/kernels/pull"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/kernels/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"versionNumber": 1})))
        .mount(server)
        .await;
}

/// Submit a valid job through the router and return its ID.
async fn submit(state: &AppState) -> String {
    let body = multipart(
        &[("title", "Night Drive"), ("style", "neon noir"), ("clip_duration", "12")],
        Some(("night.mp3", "audio/mpeg", &b"ID3-fake-audio"[..])),
    );
    let response = router(state).oneshot(submit_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    json["job_id"].as_str().unwrap().to_string()
}

/// Register a submitted job directly, bypassing the platform.
async fn register_submitted(state: &AppState, latest: Option<StatusSnapshot>) -> String {
    let mut job = Job::new(
        JobParams {
            title: "Song".to_string(),
            visual_style: "ink".to_string(),
            clip_duration_seconds: 10,
        },
        InputAssetRef {
            file_name: "song.mp3".to_string(),
            size_bytes: 4,
            content_type: "audio/mpeg".to_string(),
            sha256: String::new(),
        },
    );
    job.transition(JobState::Uploading).unwrap();
    job.assign_handle(JobHandle::new("alice", "mvgen-job-1234abcd", "mvgen-in-1234abcd"));
    job.transition(JobState::Submitted).unwrap();
    let id = job.id.clone();

    state.registry.upsert(job).await;
    if let Some(snapshot) = latest {
        state.registry.apply_snapshot(&id, snapshot).await;
    }
    id.to_string()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_sets_headers() {
    let state = test_state("http://127.0.0.1:9");
    let response = router(&state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Request-ID", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(body_json(response).await["status"], json!("healthy"));
}

#[tokio::test]
async fn test_ready_reports_configured_platform() {
    let state = test_state("http://127.0.0.1:9");
    let response = router(&state).oneshot(get("/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], json!("ready"));
    assert_eq!(json["active_jobs"], json!(0));
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_without_audio_is_bad_request() {
    let server = MockServer::start().await;
    let state = test_state(&server.uri());

    let body = multipart(&[("title", "Night Drive"), ("style", "neon noir")], None);
    let response = router(&state).oneshot(submit_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], json!("bad_request"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_submit_rejects_bad_parameters() {
    let server = MockServer::start().await;
    let state = test_state(&server.uri());

    let body = multipart(
        &[("title", "Night Drive"), ("style", "neon noir"), ("clip_duration", "soon")],
        Some(("night.mp3", "audio/mpeg", &b"ID3"[..])),
    );
    let response = router(&state).oneshot(submit_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], json!("validation_error"));

    let body = multipart(
        &[("title", ""), ("style", "neon noir")],
        Some(("night.mp3", "audio/mpeg", &b"ID3"[..])),
    );
    let response = router(&state).oneshot(submit_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = multipart(
        &[("title", "Night Drive"), ("style", "neon noir")],
        Some(("notes.txt", "text/plain", &b"hello"[..])),
    );
    let response = router(&state).oneshot(submit_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_then_get_job() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    let state = test_state(&server.uri());

    let job_id = submit(&state).await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["job"]["state"], json!("submitted"));
    assert_eq!(json["job"]["clip_duration_seconds"], json!(12));
    assert_eq!(json["job"]["remote_handle"]["owner"], json!("alice"));
}

#[tokio::test]
async fn test_platform_rejection_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/datasets/status/alice/[a-z0-9-]+$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/blobs/upload"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;
    let state = test_state(&server.uri());

    let body = multipart(
        &[("title", "Night Drive"), ("style", "neon noir")],
        Some(("night.mp3", "audio/mpeg", &b"ID3"[..])),
    );
    let response = router(&state).oneshot(submit_request(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], json!("upstream_error"));
    assert_eq!(state.registry.len().await, 1);
    assert!(state.registry.active().await.is_empty());
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn test_status_polls_platform() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    Mock::given(method("GET"))
        .and(path("/kernels/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "running"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/kernels/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "complete"})))
        .mount(&server)
        .await;
    let state = test_state(&server.uri());
    let job_id = submit(&state).await;
    let status_uri = format!("/api/jobs/{}/status", job_id);

    let running = body_json(router(&state).oneshot(get(&status_uri)).await.unwrap()).await;
    assert_eq!(running["ui_stage"], json!("clips"));
    assert_eq!(running["done"], json!(false));
    assert!(running.get("download_url").is_none());

    let complete = body_json(router(&state).oneshot(get(&status_uri)).await.unwrap()).await;
    assert_eq!(complete["ui_stage"], json!("done"));
    assert_eq!(complete["done"], json!(true));
    assert_eq!(
        complete["download_url"],
        json!(format!("/api/jobs/{}/download", job_id))
    );
    assert!(complete.get("finished_at").is_some());

    let record = body_json(
        router(&state)
            .oneshot(get(&format!("/api/jobs/{}", job_id)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(record["job"]["state"], json!("complete"));
}

#[tokio::test]
async fn test_status_remote_error_is_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kernels/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("kernel service down"))
        .mount(&server)
        .await;
    let state = test_state(&server.uri());
    let job_id = register_submitted(&state, None).await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/status", job_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert!(json["detail"].as_str().unwrap().contains("kernel service down"));
}

#[tokio::test]
async fn test_status_unreachable_platform_returns_last_snapshot() {
    let state = test_state("http://127.0.0.1:9");
    let running = StatusSnapshot::from_remote(RemoteState::Running, None, None);
    let job_id = register_submitted(&state, Some(running)).await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/status", job_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["remote_state"], json!("running"));
    assert_eq!(json["progress_percent"], json!(50));
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let state = test_state("http://127.0.0.1:9");

    for uri in [
        "/api/jobs/nope",
        "/api/jobs/nope/status",
        "/api/jobs/nope/download",
    ] {
        let response = router(&state).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body_json(response).await["code"], json!("not_found"));
    }
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn test_download_not_ready_lists_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kernels/output"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"fileName": "clip_000.mp4", "url": "/files/clip_000.mp4"}],
        })))
        .mount(&server)
        .await;
    let state = test_state(&server.uri());
    let job_id = register_submitted(&state, None).await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/download", job_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], json!("output_not_ready"));
    assert_eq!(json["files"], json!(["clip_000.mp4"]));
}

#[tokio::test]
async fn test_download_of_failed_job_reports_remote_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kernels/output"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"fileName": "log.txt", "url": "/files/log.txt"}],
        })))
        .mount(&server)
        .await;
    let state = test_state(&server.uri());
    let failed = StatusSnapshot::from_remote(RemoteState::Error, Some("CUDA OOM".to_string()), None);
    let job_id = register_submitted(&state, Some(failed)).await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/download", job_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], json!("remote_job_failed"));
    assert_eq!(json["state"], json!("error"));
    assert!(json["detail"].as_str().unwrap().contains("CUDA OOM"));
    assert!(json.get("files").is_none());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_superseded_job_never_takes_successor_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kernels/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "complete"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/kernels/output"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"fileName": "output_final.mp4", "url": "/files/output_final.mp4"}],
        })))
        .mount(&server)
        .await;
    let state = test_state(&server.uri());

    // Both jobs share one job slot, as with fixed slot naming
    let old_id = register_submitted(&state, None).await;
    let new_id = register_submitted(&state, None).await;
    let handle = JobHandle::new("alice", "mvgen-job-1234abcd", "mvgen-in-1234abcd");
    state
        .registry
        .supersede(&handle, &JobId::from_string(new_id.as_str()))
        .await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/status", old_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["remote_state"], json!("cancelled"));
    assert!(json.get("download_url").is_none());

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/download", old_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], json!("remote_job_failed"));
    assert_eq!(json["state"], json!("cancelled"));

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/status", new_id)))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["remote_state"], json!("complete"));
}

#[tokio::test]
async fn test_download_streams_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/kernels/output"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"fileName": "output_final.mp4", "url": "/files/output_final.mp4"}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/output_final.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"final-video".to_vec())
                .insert_header("content-type", "video/mp4"),
        )
        .mount(&server)
        .await;
    let state = test_state(&server.uri());
    let job_id = register_submitted(&state, None).await;

    let response = router(&state)
        .oneshot(get(&format!("/api/jobs/{}/download", job_id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "11");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"output_final.mp4\""
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"final-video");
}
