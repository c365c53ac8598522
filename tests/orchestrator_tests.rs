//! End-to-end tests for `RequestOrchestrator` with a mocked Ollama backend.
//!
//! The backend is a `wiremock` server, telemetry is scripted with
//! `FixedProbe`, and the log lives in a temp dir.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use adaptive_inference_router::{
    FixedProbe, InferenceRecord, MetricsRecorder, Mode, ModelRouter, OllamaWorker,
    RequestOrchestrator, RoutingRule, SystemSnapshot,
};

struct Harness {
    _dir: tempfile::TempDir,
    log: std::path::PathBuf,
    orchestrator: RequestOrchestrator,
}

fn harness(server: &MockServer, probe: FixedProbe, timeout: Duration) -> Harness {
    let dir = tempfile::tempdir().expect("test: tempdir");
    let log = dir.path().join("logs.csv");
    let worker = OllamaWorker::new()
        .with_url(server.uri())
        .with_timeout(timeout);
    let orchestrator = RequestOrchestrator::new(
        Arc::new(probe),
        ModelRouter::default(),
        Arc::new(worker),
        Arc::new(MetricsRecorder::new(&log)),
    )
    .with_backend_timeout(timeout);
    Harness {
        _dir: dir,
        log,
        orchestrator,
    }
}

fn logged(path: &std::path::Path) -> Vec<InferenceRecord> {
    csv::Reader::from_path(path)
        .expect("test: open csv")
        .deserialize()
        .collect::<Result<_, _>>()
        .expect("test: deserialize")
}

async fn mount_reply(server: &MockServer, reply: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": reply, "done": true}))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_successful_request_is_logged_with_telemetry_deltas() {
    let server = MockServer::start().await;
    mount_reply(&server, "Artificial intelligence is a field.", Duration::ZERO).await;

    let before = SystemSnapshot::default()
        .with_cpu_util(10.0)
        .with_gpu_util(20.0)
        .with_gpu_mem(1.0, 10.0)
        .with_cpu_mem(6.0, 16.0);
    let after = SystemSnapshot::default()
        .with_cpu_util(35.5)
        .with_gpu_util(20.0)
        .with_gpu_mem(1.0, 10.0)
        .with_cpu_mem(6.25, 16.0);
    let h = harness(
        &server,
        FixedProbe::sequence(vec![before, after]),
        Duration::from_secs(5),
    );

    let outcome = h
        .orchestrator
        .handle("What is AI?", Mode::Adaptive, None)
        .await
        .expect("test: handle");

    assert!(outcome.backend_ok);
    assert_eq!(outcome.output, "Artificial intelligence is a field.");
    assert_eq!(outcome.record.selected_model, "phi3");
    assert_eq!(outcome.record.output_tokens, 5);
    assert_eq!(outcome.record.prompt_length, 3);
    assert_eq!(outcome.record.cpu_util_delta, 25.5);
    assert_eq!(outcome.record.cpu_mem_after_gb, 6.25);
    assert_eq!(outcome.record.gpu_mem_util_before_pct, 10.0);

    let rows = logged(&h.log);
    assert_eq!(rows, vec![outcome.record]);
}

#[tokio::test]
async fn test_backend_timeout_returns_diagnostic_and_logs_record() {
    let server = MockServer::start().await;
    mount_reply(&server, "too late", Duration::from_secs(5)).await;

    let h = harness(
        &server,
        FixedProbe::constant(SystemSnapshot::default().with_cpu_util(5.0)),
        Duration::from_millis(200),
    );

    let outcome = h
        .orchestrator
        .handle("hi", Mode::Adaptive, None)
        .await
        .expect("test: handle");

    assert!(!outcome.backend_ok);
    assert!(outcome.output.starts_with("[Error contacting backend:"));
    assert!(outcome.record.latency_s >= 0.2, "latency {}", outcome.record.latency_s);
    assert!(outcome.record.latency_s < 2.0, "latency {}", outcome.record.latency_s);

    let rows = logged(&h.log);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].latency_s, outcome.record.latency_s);
}

#[tokio::test]
async fn test_backend_http_error_is_recorded_not_raised() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let h = harness(
        &server,
        FixedProbe::constant(SystemSnapshot::default()),
        Duration::from_secs(5),
    );

    let outcome = h
        .orchestrator
        .handle("hi", Mode::Gpu, None)
        .await
        .expect("test: handle");
    assert!(!outcome.backend_ok);
    assert!(outcome.output.contains("503"));
    assert_eq!(outcome.record.selected_model, "gemma3");
    assert_eq!(logged(&h.log).len(), 1);
}

#[tokio::test]
async fn test_forced_gpu_under_overload_still_uses_gpu_model() {
    let server = MockServer::start().await;
    mount_reply(&server, "ok", Duration::ZERO).await;

    let overloaded = SystemSnapshot::default()
        .with_cpu_util(50.0)
        .with_gpu_util(90.0)
        .with_gpu_mem(9.8, 10.0);
    let h = harness(
        &server,
        FixedProbe::constant(overloaded),
        Duration::from_secs(5),
    );

    let long_prompt = vec!["token"; 70].join(" ");
    let adaptive = h
        .orchestrator
        .handle(&long_prompt, Mode::Adaptive, None)
        .await
        .expect("test: adaptive");
    let forced = h
        .orchestrator
        .handle(&long_prompt, Mode::Gpu, None)
        .await
        .expect("test: forced");

    assert_eq!(adaptive.record.selected_model, "phi3");
    assert_eq!(forced.record.selected_model, "gemma3");
    let decision = h
        .orchestrator
        .router()
        .route(&SystemSnapshot::default(), &long_prompt, Mode::Gpu, None);
    assert_eq!(decision.rule, RoutingRule::ForcedGpu);
    assert_eq!(logged(&h.log).len(), 2);
}

#[tokio::test]
async fn test_concurrent_requests_each_log_one_row() {
    let server = MockServer::start().await;
    mount_reply(&server, "ok", Duration::from_millis(20)).await;

    let h = Arc::new(harness(
        &server,
        FixedProbe::constant(SystemSnapshot::default()),
        Duration::from_secs(5),
    ));

    let mut handles = Vec::new();
    for i in 0..10 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            h.orchestrator
                .handle(&format!("request {i}"), Mode::Cpu, None)
                .await
        }));
    }
    for handle in handles {
        handle.await.expect("test: join").expect("test: handle");
    }

    assert_eq!(logged(&h.log).len(), 10);
}
