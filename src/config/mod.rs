//! # Stage: Service Configuration
//!
//! ## Responsibility
//! Parse and validate the TOML file that configures the router service:
//! ```text
//! router --config router.toml
//! ```
//!
//! ## Guarantees
//! - Every field has a documented default; an empty file is a valid config
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building the runtime objects from config (that belongs to `main`)
//! - Routing thresholds, which are fixed constants in `routing::router`

pub mod loader;
pub mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::routing::RoutingConfig;

pub use loader::{load_from_file, load_from_str};
pub use validation::ConfigError;

// ── Default value functions ──────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Default request body limit: 1 MiB.
fn default_max_request_size() -> usize {
    1024 * 1024
}

fn default_response_max_chars() -> usize {
    crate::orchestrator::DEFAULT_RESPONSE_MAX_CHARS
}

fn default_backend_url() -> String {
    crate::worker::DEFAULT_OLLAMA_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_log_path() -> PathBuf {
    PathBuf::from("logs.csv")
}

fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a router instance.
///
/// # Example
///
/// ```toml
/// [server]
/// port = 8000
///
/// [backend]
/// url = "http://127.0.0.1:11434"
/// timeout_secs = 120
///
/// [models]
/// cpu_model = "phi3"
/// gpu_model = "gemma3"
///
/// [log]
/// path = "logs.csv"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RouterConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Text-generation backend settings.
    #[serde(default)]
    pub backend: BackendConfig,
    /// The two models the router chooses between.
    #[serde(default)]
    pub models: RoutingConfig,
    /// CSV metrics log settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Telemetry probe settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Logging output settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body in bytes; larger bodies get 413.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    /// Maximum characters of backend output echoed in a response.
    #[serde(default = "default_response_max_chars")]
    pub response_max_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_request_size: default_max_request_size(),
            response_max_chars: default_response_max_chars(),
        }
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BackendConfig {
    /// Base URL of the Ollama-compatible server. `OLLAMA_URL` overrides it.
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Upper bound on one backend call, seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    /// [`timeout_secs`](Self::timeout_secs) as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// CSV metrics log settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct LogConfig {
    /// Path of the append-only CSV log.
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
        }
    }
}

/// Telemetry probe settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TelemetryConfig {
    /// Query the GPU at all. Only effective with the `nvml` feature.
    #[serde(default = "default_true")]
    pub gpu: bool,
    /// NVML device index to sample.
    #[serde(default)]
    pub gpu_index: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            gpu: true,
            gpu_index: 0,
        }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ObservabilityConfig {
    /// Log output format. `LOG_FORMAT` in the environment takes precedence.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable log output.
    #[default]
    Pretty,
    /// Structured JSON log output for machine consumption.
    Json,
}

impl LogFormat {
    /// Value understood by `init_tracing` via `LOG_FORMAT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Export the JSON Schema for [`RouterConfig`].
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(RouterConfig);
    serde_json::to_string_pretty(&schema)
}
