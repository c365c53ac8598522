//! Prometheus metrics for the routing pipeline.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup before serving requests.
//! The helper functions (`inc_routed`, `inc_backend_error`, …) are no-ops if
//! `init_metrics` was never called, so library users and tests can run the
//! pipeline without a registry.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `router_requests_total` | Counter | `model`, `rule` |
//! | `router_backend_errors_total` | Counter | `model` |
//! | `router_inference_duration_seconds` | Histogram | `model` |
//! | `router_log_write_failures_total` | Counter | none |

use crate::RouterError;
use prometheus::{
    core::Collector, Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// Backend latency buckets in seconds. Local models range from sub-second
/// replies to the two-minute timeout.
const LATENCY_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the router, stored in a single [`OnceLock`].
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Routed requests by selected model and matched rule.
    pub requests_total: CounterVec,
    /// Failed or timed-out backend calls by model.
    pub backend_errors: CounterVec,
    /// Backend call latency by model.
    pub inference_duration: HistogramVec,
    /// Records that could not be appended to the CSV log.
    pub log_write_failures: Counter,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn init_err(e: prometheus::Error) -> RouterError {
    RouterError::Other(format!("metrics init failed: {e}"))
}

fn build(prefix: &str) -> Result<Metrics, RouterError> {
    let registry = Registry::new();

    let requests_total = CounterVec::new(
        Opts::new(
            format!("{prefix}_requests_total"),
            "Requests routed, by model and rule",
        ),
        &["model", "rule"],
    )
    .map_err(init_err)?;
    registry
        .register(Box::new(requests_total.clone()))
        .map_err(init_err)?;

    let backend_errors = CounterVec::new(
        Opts::new(
            format!("{prefix}_backend_errors_total"),
            "Backend calls that failed or timed out",
        ),
        &["model"],
    )
    .map_err(init_err)?;
    registry
        .register(Box::new(backend_errors.clone()))
        .map_err(init_err)?;

    let inference_duration = HistogramVec::new(
        HistogramOpts::new(
            format!("{prefix}_inference_duration_seconds"),
            "Backend call latency",
        )
        .buckets(LATENCY_BUCKETS.to_vec()),
        &["model"],
    )
    .map_err(init_err)?;
    registry
        .register(Box::new(inference_duration.clone()))
        .map_err(init_err)?;

    let log_write_failures = Counter::new(
        format!("{prefix}_log_write_failures_total"),
        "Inference records that could not be appended to the log",
    )
    .map_err(init_err)?;
    registry
        .register(Box::new(log_write_failures.clone()))
        .map_err(init_err)?;

    Ok(Metrics {
        registry,
        requests_total,
        backend_errors,
        inference_duration,
        log_write_failures,
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if metric construction or registry
/// registration fails.
pub fn init_metrics() -> Result<(), RouterError> {
    if METRICS.get().is_some() {
        return Ok(());
    }
    let metrics = build("router")?;
    // A racing initialiser builds identical descriptors; first one wins.
    let _ = METRICS.set(metrics);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one routed request. No-op before [`init_metrics`].
pub fn inc_routed(model: &str, rule: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.requests_total.get_metric_with_label_values(&[model, rule]) {
            c.inc();
        }
    }
}

/// Count one failed backend call. No-op before [`init_metrics`].
pub fn inc_backend_error(model: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.backend_errors.get_metric_with_label_values(&[model]) {
            c.inc();
        }
    }
}

/// Observe backend latency for `model`. No-op before [`init_metrics`].
pub fn record_inference_latency(model: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.inference_duration.get_metric_with_label_values(&[model]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Count one lost record. No-op before [`init_metrics`].
pub fn inc_log_write_failure() {
    if let Some(m) = metrics() {
        m.log_write_failures.inc();
    }
}

/// Gather all registered metrics as a raw list of metric families.
///
/// Returns an empty `Vec` if metrics have not been initialised.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Counter totals reported by the health endpoint.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct MetricsSummary {
    /// Routed requests keyed by model.
    pub requests_by_model: HashMap<String, u64>,
    /// Backend failures keyed by model.
    pub backend_errors_by_model: HashMap<String, u64>,
    /// Records lost to log write failures.
    pub log_write_failures: u64,
}

fn sum_by_label(vec: &CounterVec, label: &str) -> HashMap<String, u64> {
    let mut out = HashMap::new();
    for family in vec.collect() {
        for metric in family.get_metric() {
            let key = metric
                .get_label()
                .iter()
                .find(|l| l.get_name() == label)
                .map_or("unknown", |l| l.get_value());
            *out.entry(key.to_string()).or_insert(0) += metric.get_counter().get_value() as u64;
        }
    }
    out
}

/// Return a structured summary of current counter values.
///
/// Returns a zeroed [`MetricsSummary`] if metrics have not been initialised.
pub fn get_metrics_summary() -> MetricsSummary {
    let Some(m) = metrics() else {
        return MetricsSummary::default();
    };
    MetricsSummary {
        requests_by_model: sum_by_label(&m.requests_total, "model"),
        backend_errors_by_model: sum_by_label(&m.backend_errors, "model"),
        log_write_failures: m.log_write_failures.get() as u64,
    }
}
