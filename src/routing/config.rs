//! Routing configuration types.
//!
//! Provides [`RoutingConfig`], which names the CPU-oriented and GPU-oriented
//! backend models. The rule thresholds themselves are fixed policy constants
//! in [`super::router`] and are not configurable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ────────────────────────────────────────────

/// Default CPU-oriented model: a small model that runs acceptably on CPU.
fn default_cpu_model() -> String {
    "phi3".to_string()
}

/// Default GPU-oriented model.
fn default_gpu_model() -> String {
    "gemma3".to_string()
}

// ── RoutingConfig ──────────────────────────────────────────────────────

/// The two backend models the router chooses between.
///
/// Deserialised from the `[models]` table of the service config.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Model identifier selected when the CPU-oriented backend wins.
    ///
    /// Default: `"phi3"`.
    #[serde(default = "default_cpu_model")]
    pub cpu_model: String,

    /// Model identifier selected when the GPU-oriented backend wins.
    ///
    /// Default: `"gemma3"`.
    #[serde(default = "default_gpu_model")]
    pub gpu_model: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            cpu_model: default_cpu_model(),
            gpu_model: default_gpu_model(),
        }
    }
}
