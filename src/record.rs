//! The per-request audit record and its on-disk column layout.
//!
//! [`LOG_COLUMNS`] is the persisted schema. Its order is a compatibility
//! contract with downstream consumers: new columns may only be appended,
//! never inserted, renamed or reordered. [`InferenceRecord::csv_row`] is the
//! single place that maps record fields onto that order, and its return type
//! is a fixed-length array so a mismatch fails to compile.

use serde::{Deserialize, Serialize};

use crate::routing::{Mode, RoutingDecision};
use crate::telemetry::{round2, SystemSnapshot};

/// Number of persisted columns.
pub const COLUMN_COUNT: usize = 20;

/// Persisted column names, in on-disk order.
pub const LOG_COLUMNS: [&str; COLUMN_COUNT] = [
    "timestamp",
    "mode",
    "selected_model",
    "decision_reason",
    "latency_s",
    "prompt_length",
    "output_tokens",
    "throughput_tokens_per_s",
    "cpu_util_before",
    "cpu_util_after",
    "cpu_util_delta",
    "gpu_util_before",
    "gpu_util_after",
    "gpu_util_delta",
    "cpu_mem_before_gb",
    "cpu_mem_after_gb",
    "gpu_mem_before_gb",
    "gpu_mem_after_gb",
    "gpu_mem_util_before_pct",
    "gpu_mem_util_after_pct",
];

/// Request-side metadata captured when a request arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMeta {
    /// ISO-8601 UTC arrival time.
    pub timestamp: String,
    /// Mode the caller asked for.
    pub mode: Mode,
    /// Prompt length in whitespace-delimited words.
    pub prompt_length: usize,
}

/// Full audit row for one request.
///
/// Built once after the backend call returns, appended to the log exactly
/// once, never mutated afterwards. Field order matches [`LOG_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    /// ISO-8601 UTC time the request was received.
    pub timestamp: String,
    /// Requested mode.
    pub mode: Mode,
    /// Model the router chose.
    pub selected_model: String,
    /// Why the router chose it.
    pub decision_reason: String,
    /// Wall-clock backend latency in seconds, including failed calls.
    pub latency_s: f64,
    /// Prompt length in words.
    pub prompt_length: usize,
    /// Words in the backend's returned text (or diagnostic text on failure).
    pub output_tokens: usize,
    /// `output_tokens / latency_s`, or `0.0` when `latency_s` is not positive.
    pub throughput_tokens_per_s: f64,
    /// CPU utilization before the call; `None` if unmeasurable.
    pub cpu_util_before: Option<f64>,
    /// CPU utilization after the call; `None` if unmeasurable.
    pub cpu_util_after: Option<f64>,
    /// `after − before`, with missing operands as `0.0`.
    pub cpu_util_delta: f64,
    /// GPU utilization before the call.
    pub gpu_util_before: f64,
    /// GPU utilization after the call.
    pub gpu_util_after: f64,
    /// `after − before`.
    pub gpu_util_delta: f64,
    /// Host memory used before, GiB.
    pub cpu_mem_before_gb: f64,
    /// Host memory used after, GiB.
    pub cpu_mem_after_gb: f64,
    /// GPU memory used before, GiB.
    pub gpu_mem_before_gb: f64,
    /// GPU memory used after, GiB.
    pub gpu_mem_after_gb: f64,
    /// GPU memory utilization before, percent.
    pub gpu_mem_util_before_pct: f64,
    /// GPU memory utilization after, percent.
    pub gpu_mem_util_after_pct: f64,
}

impl InferenceRecord {
    /// Assemble a record and compute its derived metrics.
    pub fn assemble(
        request: RequestMeta,
        decision: &RoutingDecision,
        latency_s: f64,
        output_tokens: usize,
        before: &SystemSnapshot,
        after: &SystemSnapshot,
    ) -> Self {
        Self {
            timestamp: request.timestamp,
            mode: request.mode,
            selected_model: decision.selected_model.clone(),
            decision_reason: decision.decision_reason.clone(),
            latency_s,
            prompt_length: request.prompt_length,
            output_tokens,
            throughput_tokens_per_s: throughput(output_tokens, latency_s),
            cpu_util_before: before.cpu_util_pct,
            cpu_util_after: after.cpu_util_pct,
            cpu_util_delta: delta(before.cpu_util_pct, after.cpu_util_pct),
            gpu_util_before: before.gpu_util_pct,
            gpu_util_after: after.gpu_util_pct,
            gpu_util_delta: delta(Some(before.gpu_util_pct), Some(after.gpu_util_pct)),
            cpu_mem_before_gb: before.cpu_mem_used_gb,
            cpu_mem_after_gb: after.cpu_mem_used_gb,
            gpu_mem_before_gb: before.gpu_mem_used_gb,
            gpu_mem_after_gb: after.gpu_mem_used_gb,
            gpu_mem_util_before_pct: before.gpu_mem_util_pct,
            gpu_mem_util_after_pct: after.gpu_mem_util_pct,
        }
    }

    /// Project the record onto [`LOG_COLUMNS`].
    ///
    /// Absent values become empty cells so every row has exactly
    /// [`COLUMN_COUNT`] fields.
    pub fn csv_row(&self) -> [String; COLUMN_COUNT] {
        [
            self.timestamp.clone(),
            self.mode.to_string(),
            self.selected_model.clone(),
            self.decision_reason.clone(),
            self.latency_s.to_string(),
            self.prompt_length.to_string(),
            self.output_tokens.to_string(),
            self.throughput_tokens_per_s.to_string(),
            optional(self.cpu_util_before),
            optional(self.cpu_util_after),
            self.cpu_util_delta.to_string(),
            self.gpu_util_before.to_string(),
            self.gpu_util_after.to_string(),
            self.gpu_util_delta.to_string(),
            self.cpu_mem_before_gb.to_string(),
            self.cpu_mem_after_gb.to_string(),
            self.gpu_mem_before_gb.to_string(),
            self.gpu_mem_after_gb.to_string(),
            self.gpu_mem_util_before_pct.to_string(),
            self.gpu_mem_util_after_pct.to_string(),
        ]
    }
}

/// Tokens per second, guarded against zero, negative and non-finite latency.
pub fn throughput(output_tokens: usize, latency_s: f64) -> f64 {
    if latency_s > 0.0 && latency_s.is_finite() {
        round2(output_tokens as f64 / latency_s)
    } else {
        0.0
    }
}

/// `after − before` with a missing operand treated as `0.0`.
pub fn delta(before: Option<f64>, after: Option<f64>) -> f64 {
    round2(after.unwrap_or(0.0) - before.unwrap_or(0.0))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
