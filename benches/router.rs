//! Router benchmarks: per-request overhead added on top of the backend call.
//!
//! - `route/*`: rule evaluation for each adaptive outcome
//! - `csv_row`: projecting a record onto the log columns
//! - `handle_echo`: full request path with scripted telemetry, an instant
//!   backend and a temp-file log

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use tokio::runtime::Runtime;

use adaptive_inference_router::record::RequestMeta;
use adaptive_inference_router::{
    EchoWorker, FixedProbe, InferenceRecord, MetricsRecorder, Mode, ModelRouter,
    RequestOrchestrator, SystemSnapshot,
};

fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

fn bench_route(c: &mut Criterion) {
    let router = ModelRouter::default();
    let cases = [
        (
            "gpu_overloaded",
            SystemSnapshot::default()
                .with_cpu_util(50.0)
                .with_gpu_util(90.0)
                .with_gpu_mem(9.8, 10.0),
            words(70),
        ),
        (
            "small_prompt",
            SystemSnapshot::default().with_cpu_util(10.0),
            words(5),
        ),
        (
            "fallback",
            SystemSnapshot::default()
                .with_cpu_util(50.0)
                .with_gpu_util(50.0),
            words(40),
        ),
    ];

    let mut group = c.benchmark_group("route");
    for (name, snapshot, prompt) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), prompt, |b, prompt| {
            b.iter(|| router.route(black_box(snapshot), black_box(prompt), Mode::Adaptive, None))
        });
    }
    group.finish();
}

fn bench_csv_row(c: &mut Criterion) {
    let snapshot = SystemSnapshot::default()
        .with_cpu_util(12.5)
        .with_gpu_util(40.0)
        .with_gpu_mem(3.0, 24.0);
    let decision = ModelRouter::default().route(&snapshot, "hi", Mode::Adaptive, None);
    let record = InferenceRecord::assemble(
        RequestMeta {
            timestamp: "2026-01-01T00:00:00.000000Z".into(),
            mode: Mode::Adaptive,
            prompt_length: 1,
        },
        &decision,
        0.42,
        17,
        &snapshot,
        &snapshot,
    );

    c.bench_function("csv_row", |b| b.iter(|| black_box(&record).csv_row()));
}

fn bench_handle_echo(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let dir = tempfile::tempdir().expect("tempdir");
    let orchestrator = RequestOrchestrator::new(
        Arc::new(FixedProbe::constant(
            SystemSnapshot::default().with_cpu_util(10.0),
        )),
        ModelRouter::default(),
        Arc::new(EchoWorker::with_delay(0)),
        Arc::new(MetricsRecorder::new(dir.path().join("bench.csv"))),
    );

    c.bench_function("handle_echo", |b| {
        b.to_async(&rt).iter(|| async {
            let outcome = orchestrator
                .handle("What is AI?", Mode::Adaptive, None)
                .await
                .expect("handle");
            black_box(outcome);
        })
    });
}

criterion_group!(benches, bench_route, bench_csv_row, bench_handle_echo);
criterion_main!(benches);
