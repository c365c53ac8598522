//! # adaptive-inference-router
//!
//! Routes each inference request to a CPU-oriented or a GPU-oriented model
//! based on live system load and prompt shape, and records a before/after
//! telemetry snapshot for every request in an append-only CSV log.
//!
//! ## Architecture
//!
//! Strictly sequential per request:
//! ```text
//! sample() → route() → backend.generate() → sample() → deltas → append() → respond
//! ```
//!
//! - [`telemetry`]: point-in-time CPU/GPU/memory snapshots
//! - [`routing`]: first-match-wins routing rules
//! - [`recorder`]: fixed-schema CSV log writer
//! - [`orchestrator`]: composes the above around one backend call

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod record;
pub mod recorder;
pub mod routing;
pub mod telemetry;
pub mod worker;

#[cfg(feature = "web-api")]
pub mod web_api;

// Re-exports for convenience
pub use orchestrator::{InferenceOutcome, RequestOrchestrator};
pub use record::{InferenceRecord, LOG_COLUMNS};
pub use recorder::MetricsRecorder;
pub use routing::{Mode, ModelRouter, RoutingDecision, RoutingRule};
pub use telemetry::{FixedProbe, SystemProbe, SystemSnapshot, TelemetryProbe};
pub use worker::{EchoWorker, ModelWorker, OllamaWorker};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (default: `info`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
pub fn init_tracing() -> Result<(), RouterError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    init_tracing_as(&format)
}

/// Initialise the global tracing subscriber with an explicit format
/// (`"json"` or pretty).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if the global subscriber has already
/// been set.
pub fn init_tracing_as(format: &str) -> Result<(), RouterError> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter())
            .try_init(),
    };

    result.map_err(|e| RouterError::Other(format!("tracing init failed: {e}")))
}

/// Top-level router errors.
///
/// Backend failures ([`RouterError::Inference`], [`RouterError::Timeout`])
/// are recovered inside the orchestrator and never abort a request.
/// [`RouterError::LogWrite`] is the one pipeline failure surfaced to callers.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The backend call failed (connection, non-2xx status, or parse error).
    #[error("inference failed: {0}")]
    Inference(String),

    /// The backend did not answer within the configured bound.
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),

    /// A record could not be durably appended to the metrics log.
    #[error("failed to write metrics log {path}: {source}")]
    LogWrite {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying I/O or CSV encoding error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl RouterError {
    /// Return `true` if the error came from the backend call rather than
    /// from the routing/recording pipeline itself.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Inference(_) | Self::Timeout(_))
    }
}

/// Count whitespace-delimited tokens in `text`.
///
/// Used for both the prompt length fed to the router and the output token
/// count written to the log.
///
/// # Example
///
/// ```rust
/// use adaptive_inference_router::word_count;
/// assert_eq!(word_count("  What is   AI? "), 3);
/// assert_eq!(word_count(""), 0);
/// ```
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
