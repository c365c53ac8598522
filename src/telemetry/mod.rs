//! # Stage: Telemetry Probing
//!
//! ## Responsibility
//! Capture a point-in-time [`SystemSnapshot`] of CPU utilization, host
//! memory, and GPU utilization/memory. The orchestrator samples once before
//! and once after every backend call.
//!
//! ## Guarantees
//! - GPU fields are always numeric: `0.0` when no GPU library is compiled
//!   in, initialization failed, or a per-call query failed
//! - GPU unavailability is never an error to the caller
//! - Memory figures are GiB rounded to two decimal places
//! - Timestamps are ISO-8601 UTC
//!
//! ## Shared state
//! CPU utilization is "percentage since the previous refresh of the
//! counter". [`SystemProbe`] owns that counter and serializes samples behind
//! a mutex, so concurrent requests each observe utilization since the last
//! sample taken by *any* request, not since their own previous sample.
//!
//! ## NOT Responsible For
//! - Deciding which model to use (that belongs to `routing`)
//! - Persisting snapshots (that belongs to `recorder`)

pub mod fake;
pub mod gpu;
pub mod system;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use fake::FixedProbe;
pub use gpu::{GpuReader, GpuStats, NoGpu};
pub use system::SystemProbe;

#[cfg(feature = "nvml")]
pub use gpu::NvmlGpu;

/// Bytes per GiB.
pub(crate) const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Lower bound applied to the GPU memory total before dividing by it.
pub const GPU_MEM_EPSILON: f64 = 1e-9;

/// Source of system snapshots.
///
/// Object-safe so the orchestrator can hold `Arc<dyn TelemetryProbe>` and
/// tests can inject a [`FixedProbe`] with deterministic readings.
#[async_trait]
pub trait TelemetryProbe: Send + Sync {
    /// Take one snapshot of the host.
    ///
    /// Never fails: unmeasurable values degrade to `None` (CPU) or `0.0` (GPU).
    async fn sample(&self) -> SystemSnapshot;
}

/// One point-in-time reading of CPU/GPU/memory utilization.
///
/// Created fresh on each [`TelemetryProbe::sample`] call and never mutated
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Wall-clock UTC instant of the sample, ISO-8601.
    pub timestamp: String,
    /// CPU utilization percentage (0–100), `None` if unmeasurable.
    pub cpu_util_pct: Option<f64>,
    /// Host memory in use, GiB.
    pub cpu_mem_used_gb: f64,
    /// Total host memory, GiB.
    pub cpu_mem_total_gb: f64,
    /// Host memory utilization percentage.
    pub cpu_mem_util_pct: f64,
    /// GPU utilization percentage; `0.0` when no GPU is present.
    pub gpu_util_pct: f64,
    /// GPU memory in use, GiB.
    pub gpu_mem_used_gb: f64,
    /// Total GPU memory, GiB.
    pub gpu_mem_total_gb: f64,
    /// GPU memory utilization percentage.
    pub gpu_mem_util_pct: f64,
}

impl SystemSnapshot {
    /// CPU utilization with an unmeasurable reading treated as `0.0`.
    pub fn cpu_util_or_zero(&self) -> f64 {
        self.cpu_util_pct.unwrap_or(0.0)
    }

    /// Fraction of GPU memory in use.
    ///
    /// Divides by `max(gpu_mem_total_gb, ε)`, so a host without a GPU
    /// yields `0.0` rather than `NaN`.
    pub fn gpu_mem_ratio(&self) -> f64 {
        self.gpu_mem_used_gb / self.gpu_mem_total_gb.max(GPU_MEM_EPSILON)
    }

    /// Set the CPU utilization reading.
    pub fn with_cpu_util(mut self, pct: f64) -> Self {
        self.cpu_util_pct = Some(pct);
        self
    }

    /// Set the GPU utilization reading.
    pub fn with_gpu_util(mut self, pct: f64) -> Self {
        self.gpu_util_pct = pct;
        self
    }

    /// Set GPU memory used/total (GiB) and derive the utilization percentage.
    pub fn with_gpu_mem(mut self, used_gb: f64, total_gb: f64) -> Self {
        self.gpu_mem_used_gb = used_gb;
        self.gpu_mem_total_gb = total_gb;
        self.gpu_mem_util_pct = if total_gb > 0.0 {
            round2(used_gb / total_gb * 100.0)
        } else {
            0.0
        };
        self
    }

    /// Set host memory used/total (GiB) and derive the utilization percentage.
    pub fn with_cpu_mem(mut self, used_gb: f64, total_gb: f64) -> Self {
        self.cpu_mem_used_gb = used_gb;
        self.cpu_mem_total_gb = total_gb;
        self.cpu_mem_util_pct = if total_gb > 0.0 {
            round2(used_gb / total_gb * 100.0)
        } else {
            0.0
        };
        self
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a byte count to GiB, rounded to two decimal places.
pub(crate) fn bytes_to_gib(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GIB)
}

/// Current wall-clock instant as an ISO-8601 UTC string.
pub(crate) fn utc_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
