//! Integration tests for `src/web_api.rs`
//!
//! Each test spawns a real HTTP server on a unique port backed by an
//! `EchoWorker`, scripted telemetry and a temp-dir log, and exercises it via
//! `reqwest`.
//!
//! All tests require the `web-api` Cargo feature.

#![cfg(feature = "web-api")]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use adaptive_inference_router::config::ServerConfig;
use adaptive_inference_router::web_api::InferResponse;
use adaptive_inference_router::{
    EchoWorker, FixedProbe, MetricsRecorder, ModelRouter, RequestOrchestrator, SystemSnapshot,
    LOG_COLUMNS,
};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// Atomic counter for unique per-test port allocation.
/// Starts high to avoid collisions with common services.
static PORT_COUNTER: AtomicU16 = AtomicU16::new(29200);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct TestServer {
    base: String,
    log: PathBuf,
    _dir: tempfile::TempDir,
}

/// Spawn a server whose log lives at `log_name` inside a fresh temp dir.
async fn spawn_server_with(log_name: &str, max_request_size: usize) -> TestServer {
    let dir = tempfile::tempdir().expect("test: tempdir");
    let log = dir.path().join(log_name);
    let port = next_port();

    let probe = FixedProbe::constant(
        SystemSnapshot::default()
            .with_cpu_util(10.0)
            .with_gpu_util(20.0)
            .with_gpu_mem(1.0, 10.0),
    );
    let orchestrator = Arc::new(
        RequestOrchestrator::new(
            Arc::new(probe),
            ModelRouter::default(),
            Arc::new(EchoWorker::with_delay(1)),
            Arc::new(MetricsRecorder::new(&log)),
        )
        .with_response_max_chars(50),
    );
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port,
        max_request_size,
        response_max_chars: 50,
    };
    tokio::spawn(async move {
        let _ = adaptive_inference_router::web_api::start_server(config, orchestrator).await;
    });
    // Give the server a moment to bind.
    tokio::time::sleep(Duration::from_millis(300)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        log,
        _dir: dir,
    }
}

async fn spawn_server() -> TestServer {
    spawn_server_with("logs.csv", 1024 * 1024).await
}

fn client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("reqwest client must build in tests")
}

// ============================================================================
// POST /infer
// ============================================================================

#[tokio::test]
async fn test_infer_adaptive_small_prompt_routes_to_cpu_model() {
    let server = spawn_server().await;
    let resp = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": "What is AI?"}))
        .send()
        .await
        .expect("test: send");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: InferResponse = resp.json().await.expect("test: json");
    assert_eq!(body.model, "phi3");
    assert_eq!(body.record.selected_model, "phi3");
    assert_eq!(body.output, "What is AI?");
    assert!(body.backend_ok);
    assert_eq!(body.record.prompt_length, 3);
}

#[tokio::test]
async fn test_infer_response_exposes_every_log_column_at_top_level() {
    let server = spawn_server().await;
    let body: Value = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": "hello", "mode": "gpu"}))
        .send()
        .await
        .expect("test: send")
        .json()
        .await
        .expect("test: json");

    for column in LOG_COLUMNS {
        assert!(body.get(column).is_some(), "missing {column}");
    }
    assert_eq!(body["mode"], "gpu");
    assert_eq!(body["model"], "gemma3");
}

#[tokio::test]
async fn test_infer_explicit_model_is_used_verbatim() {
    let server = spawn_server().await;
    let body: Value = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": "hello", "mode": "cpu", "model": "mistral:7b"}))
        .send()
        .await
        .expect("test: send")
        .json()
        .await
        .expect("test: json");
    assert_eq!(body["selected_model"], "mistral:7b");
}

#[tokio::test]
async fn test_infer_unknown_mode_is_client_error() {
    let server = spawn_server().await;
    let resp = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": "hello", "mode": "tpu"}))
        .send()
        .await
        .expect("test: send");
    assert!(resp.status().is_client_error(), "got {}", resp.status());
    assert!(!server.log.exists(), "rejected request must not be logged");
}

#[tokio::test]
async fn test_infer_missing_prompt_is_client_error() {
    let server = spawn_server().await;
    let resp = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"mode": "cpu"}))
        .send()
        .await
        .expect("test: send");
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_infer_output_is_truncated_to_configured_chars() {
    let server = spawn_server().await;
    let prompt = "word ".repeat(40);
    let body: InferResponse = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": prompt, "mode": "cpu"}))
        .send()
        .await
        .expect("test: send")
        .json()
        .await
        .expect("test: json");
    assert_eq!(body.output.chars().count(), 50);
    assert_eq!(body.record.output_tokens, 40);
}

#[tokio::test]
async fn test_each_infer_appends_one_row() {
    let server = spawn_server().await;
    let c = client();
    for mode in ["cpu", "gpu", "adaptive"] {
        let resp = c
            .post(format!("{}/infer", server.base))
            .json(&json!({"prompt": "ping", "mode": mode}))
            .send()
            .await
            .expect("test: send");
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let content = std::fs::read_to_string(&server.log).expect("test: read log");
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], LOG_COLUMNS.join(","));
}

#[tokio::test]
async fn test_infer_log_write_failure_returns_500_json() {
    let server = spawn_server_with("blocked.csv", 1024 * 1024).await;
    std::fs::create_dir(&server.log).expect("test: block log path with a directory");

    let resp = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": "hello"}))
        .send()
        .await
        .expect("test: send");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.expect("test: json");
    assert_eq!(body["error"], "log_write_failed");
}

#[tokio::test]
async fn test_oversized_body_returns_413() {
    let server = spawn_server_with("logs.csv", 64).await;
    let resp = client()
        .post(format!("{}/infer", server.base))
        .json(&json!({"prompt": "x".repeat(500)}))
        .send()
        .await
        .expect("test: send");
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

// ============================================================================
// Middleware
// ============================================================================

#[tokio::test]
async fn test_request_id_is_generated_when_absent() {
    let server = spawn_server().await;
    let resp = client()
        .get(format!("{}/health", server.base))
        .send()
        .await
        .expect("test: send");
    let id = resp
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("test: x-request-id present");
    assert_eq!(id.len(), 36, "expected a UUID, got {id}");
}

#[tokio::test]
async fn test_request_id_is_echoed_when_supplied() {
    let server = spawn_server().await;
    let resp = client()
        .get(format!("{}/health", server.base))
        .header("x-request-id", "trace-abc-123")
        .send()
        .await
        .expect("test: send");
    assert_eq!(
        resp.headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("trace-abc-123")
    );
}

// ============================================================================
// Utility endpoints
// ============================================================================

#[tokio::test]
async fn test_health_reports_models() {
    let server = spawn_server().await;
    let body: Value = client()
        .get(format!("{}/health", server.base))
        .send()
        .await
        .expect("test: send")
        .json()
        .await
        .expect("test: json");
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["models"]["cpu"], "phi3");
    assert_eq!(body["models"]["gpu"], "gemma3");
}

#[tokio::test]
async fn test_schema_endpoint_serves_openapi_json() {
    let server = spawn_server().await;
    let resp = client()
        .get(format!("{}/api/v1/schema", server.base))
        .send()
        .await
        .expect("test: send");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("test: json");
    assert_eq!(body["openapi"], "3.0.0");
    assert!(body["paths"]["/infer"].is_object());
}

#[tokio::test]
async fn test_metrics_endpoint_returns_ok() {
    let server = spawn_server().await;
    let resp = client()
        .get(format!("{}/metrics", server.base))
        .send()
        .await
        .expect("test: send");
    assert_eq!(resp.status(), StatusCode::OK);
}
