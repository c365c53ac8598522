//! Host probe backed by `sysinfo` plus a [`GpuReader`].

use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::Mutex;
use tracing::debug;

use super::gpu::{self, GpuReader, GpuStats};
use super::{bytes_to_gib, round2, utc_timestamp, SystemSnapshot, TelemetryProbe};

/// Probe that reads the real host.
///
/// # CPU sampling
///
/// `sysinfo` reports CPU usage relative to the previous refresh of the same
/// [`System`]. The probe owns that `System` and serializes all samples
/// behind a mutex, so:
///
/// - the **first** sample of a probe's lifetime has no previous refresh to
///   compare against and reports a low-confidence baseline (typically
///   `0.0`). Call [`SystemProbe::prime`] once at startup to absorb it;
/// - under concurrency each sample reports usage since the last sample taken
///   by any caller, not since the caller's own previous sample.
///
/// Readings taken less than `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` apart
/// are noisy; callers should not assume per-request isolation.
pub struct SystemProbe {
    system: Mutex<System>,
    gpu: Box<dyn GpuReader>,
}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe")
            .field("gpu", &self.gpu.name())
            .finish()
    }
}

impl SystemProbe {
    /// Build a probe, detecting the GPU reader once.
    ///
    /// See [`gpu::detect`] for how the reader is chosen.
    pub fn new(gpu_enabled: bool, gpu_index: u32) -> Self {
        Self::with_gpu_reader(gpu::detect(gpu_enabled, gpu_index))
    }

    /// Build a probe around an explicit GPU reader.
    pub fn with_gpu_reader(gpu: Box<dyn GpuReader>) -> Self {
        Self {
            system: Mutex::new(System::new()),
            gpu,
        }
    }

    /// Name of the GPU backend in use.
    pub fn gpu_backend(&self) -> &'static str {
        self.gpu.name()
    }

    /// Take and discard one CPU reading so the next [`sample`](TelemetryProbe::sample)
    /// has a baseline to compare against.
    pub async fn prime(&self) {
        let mut system = self.system.lock().await;
        system.refresh_cpu();
    }

    fn read_gpu(&self) -> GpuStats {
        match self.gpu.read() {
            Ok(stats) => stats,
            Err(e) => {
                debug!(backend = self.gpu.name(), error = %e, "GPU query failed, using zeroes");
                GpuStats::ZERO
            }
        }
    }
}

#[async_trait]
impl TelemetryProbe for SystemProbe {
    async fn sample(&self) -> SystemSnapshot {
        let (cpu_util_pct, mem_used, mem_total) = {
            let mut system = self.system.lock().await;
            system.refresh_cpu();
            system.refresh_memory();

            let cpu = if sysinfo::IS_SUPPORTED_SYSTEM && !system.cpus().is_empty() {
                Some(round2(f64::from(system.global_cpu_info().cpu_usage())))
            } else {
                None
            };
            (cpu, system.used_memory(), system.total_memory())
        };

        let cpu_mem_util_pct = if mem_total > 0 {
            round2(mem_used as f64 / mem_total as f64 * 100.0)
        } else {
            0.0
        };

        let gpu = self.read_gpu();

        SystemSnapshot {
            timestamp: utc_timestamp(),
            cpu_util_pct,
            cpu_mem_used_gb: bytes_to_gib(mem_used),
            cpu_mem_total_gb: bytes_to_gib(mem_total),
            cpu_mem_util_pct,
            gpu_util_pct: gpu.util_pct,
            gpu_mem_used_gb: gpu.mem_used_gb,
            gpu_mem_total_gb: gpu.mem_total_gb,
            gpu_mem_util_pct: gpu.mem_util_pct,
        }
    }
}
