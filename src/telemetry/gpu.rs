//! GPU readers.
//!
//! The GPU capability is detected once, when the probe is built, and held
//! behind the [`GpuReader`] trait: either [`NvmlGpu`] (feature `nvml`) or the
//! zero-valued [`NoGpu`]. Per-call query failures are reported as errors
//! here and turned into zeroes by the probe.

use thiserror::Error;
use tracing::info;

/// GPU query failure. Never surfaced past the telemetry probe.
#[derive(Error, Debug)]
pub enum GpuError {
    /// The management library could not be initialised.
    #[error("GPU initialization failed: {0}")]
    InitializationFailed(String),

    /// A per-call query against an initialised device failed.
    #[error("GPU query failed: {0}")]
    QueryFailed(String),
}

/// Raw GPU figures for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuStats {
    /// Utilization percentage (0–100).
    pub util_pct: f64,
    /// Memory in use, GiB (two decimals).
    pub mem_used_gb: f64,
    /// Total memory, GiB (two decimals).
    pub mem_total_gb: f64,
    /// Memory utilization percentage (two decimals).
    pub mem_util_pct: f64,
}

impl GpuStats {
    /// The constant fallback used when no reading is available.
    pub const ZERO: GpuStats = GpuStats {
        util_pct: 0.0,
        mem_used_gb: 0.0,
        mem_total_gb: 0.0,
        mem_util_pct: 0.0,
    };
}

/// Reads utilization and memory for a single GPU.
pub trait GpuReader: Send + Sync {
    /// Short backend name for logs (`"nvml"`, `"none"`).
    fn name(&self) -> &'static str;

    /// Query the device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::QueryFailed`] if the driver call fails.
    fn read(&self) -> Result<GpuStats, GpuError>;
}

/// Reader used when no GPU library is available. Always reports zeroes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGpu;

impl GpuReader for NoGpu {
    fn name(&self) -> &'static str {
        "none"
    }

    fn read(&self) -> Result<GpuStats, GpuError> {
        Ok(GpuStats::ZERO)
    }
}

/// NVML-backed reader for one device index.
#[cfg(feature = "nvml")]
pub struct NvmlGpu {
    nvml: nvml_wrapper::Nvml,
    index: u32,
}

#[cfg(feature = "nvml")]
impl NvmlGpu {
    /// Initialise NVML and check that `index` resolves to a device.
    ///
    /// # Errors
    ///
    /// Returns [`GpuError::InitializationFailed`] if the library is missing,
    /// the driver refuses to initialise, or the device index is invalid.
    pub fn init(index: u32) -> Result<Self, GpuError> {
        let nvml = nvml_wrapper::Nvml::init()
            .map_err(|e| GpuError::InitializationFailed(e.to_string()))?;
        nvml.device_by_index(index)
            .map_err(|e| GpuError::InitializationFailed(format!("device {index}: {e}")))?;
        Ok(Self { nvml, index })
    }
}

#[cfg(feature = "nvml")]
impl GpuReader for NvmlGpu {
    fn name(&self) -> &'static str {
        "nvml"
    }

    fn read(&self) -> Result<GpuStats, GpuError> {
        let device = self
            .nvml
            .device_by_index(self.index)
            .map_err(|e| GpuError::QueryFailed(e.to_string()))?;
        let util = device
            .utilization_rates()
            .map_err(|e| GpuError::QueryFailed(e.to_string()))?;
        let mem = device
            .memory_info()
            .map_err(|e| GpuError::QueryFailed(e.to_string()))?;

        let mem_util_pct = if mem.total > 0 {
            super::round2(mem.used as f64 / mem.total as f64 * 100.0)
        } else {
            0.0
        };

        Ok(GpuStats {
            util_pct: f64::from(util.gpu),
            mem_used_gb: super::bytes_to_gib(mem.used),
            mem_total_gb: super::bytes_to_gib(mem.total),
            mem_util_pct,
        })
    }
}

/// Pick the GPU reader once at startup.
///
/// Returns [`NoGpu`] when `enabled` is false, when the crate was built
/// without the `nvml` feature, or when NVML fails to initialise.
pub fn detect(enabled: bool, index: u32) -> Box<dyn GpuReader> {
    if !enabled {
        info!("GPU telemetry disabled by configuration");
        return Box::new(NoGpu);
    }

    #[cfg(feature = "nvml")]
    {
        match NvmlGpu::init(index) {
            Ok(reader) => {
                info!(index, "NVML GPU telemetry enabled");
                Box::new(reader)
            }
            Err(e) => {
                info!(error = %e, "NVML unavailable, reporting zeroed GPU telemetry");
                Box::new(NoGpu)
            }
        }
    }

    #[cfg(not(feature = "nvml"))]
    {
        info!(
            index,
            "built without the `nvml` feature, reporting zeroed GPU telemetry"
        );
        Box::new(NoGpu)
    }
}
