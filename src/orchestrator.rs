//! # Stage: Request Orchestration
//!
//! ## Responsibility
//! Run one inference request end to end, strictly in this order:
//! arrival timestamp → telemetry before → route → backend call (bounded by a
//! timeout) → telemetry after → assemble record → append to log → respond.
//!
//! ## Guarantees
//! - Exactly one log row per request whose append succeeded
//! - Backend failures never abort a request: they become diagnostic output
//!   text, `backend_ok = false`, and a normally logged record
//! - `latency_s` covers only the backend call, including failed calls
//! - A log write failure is the only error returned to the caller
//!
//! ## Span Fields
//!
//! | Field | Description |
//! |-------|-------------|
//! | `mode` | Requested mode |
//! | `prompt_words` | Prompt length in words |
//! | `model` | Recorded after routing |
//! | `rule` | Routing rule that fired |
//! | `latency_ms` | Recorded after the backend call |
//! | `outcome` | `"ok"` or `"backend_err"` |
//!
//! Prompt and response text are never logged.
//!
//! ## NOT Responsible For
//! - HTTP framing (that belongs to `web_api`)
//! - Rule evaluation (that belongs to `routing`)

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn, Instrument, Span};

use crate::metrics;
use crate::record::{InferenceRecord, RequestMeta};
use crate::recorder::MetricsRecorder;
use crate::routing::{Mode, ModelRouter, RoutingDecision};
use crate::telemetry::{utc_timestamp, TelemetryProbe};
use crate::worker::{ModelWorker, DEFAULT_BACKEND_TIMEOUT};
use crate::{word_count, RouterError};

/// Default cap on the characters of output returned to the caller.
pub const DEFAULT_RESPONSE_MAX_CHARS: usize = 2000;

/// Result of one handled request.
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    /// The record that was appended to the log.
    pub record: InferenceRecord,
    /// Backend text, or a diagnostic message if the call failed. Truncated
    /// to the configured character cap.
    pub output: String,
    /// `false` if the backend call failed or timed out.
    pub backend_ok: bool,
}

/// Composes telemetry, routing, the backend worker and the recorder.
///
/// Share it behind an `Arc`; [`handle`](Self::handle) takes `&self` and may
/// run concurrently for many requests.
pub struct RequestOrchestrator {
    probe: Arc<dyn TelemetryProbe>,
    router: ModelRouter,
    worker: Arc<dyn ModelWorker>,
    recorder: Arc<MetricsRecorder>,
    backend_timeout: Duration,
    response_max_chars: usize,
}

impl RequestOrchestrator {
    /// Build an orchestrator with the default 120 s backend bound and
    /// 2000-character response cap.
    pub fn new(
        probe: Arc<dyn TelemetryProbe>,
        router: ModelRouter,
        worker: Arc<dyn ModelWorker>,
        recorder: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            probe,
            router,
            worker,
            recorder,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            response_max_chars: DEFAULT_RESPONSE_MAX_CHARS,
        }
    }

    /// Set the upper bound on a single backend call.
    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Set the maximum characters of output returned to the caller.
    pub fn with_response_max_chars(mut self, max_chars: usize) -> Self {
        self.response_max_chars = max_chars;
        self
    }

    /// The router in use.
    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// The recorder in use.
    pub fn recorder(&self) -> &MetricsRecorder {
        &self.recorder
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::LogWrite`] if the record could not be
    /// appended. The backend was still called and its output is discarded.
    pub async fn handle(
        &self,
        prompt: &str,
        mode: Mode,
        explicit_model: Option<&str>,
    ) -> Result<InferenceOutcome, RouterError> {
        let request = RequestMeta {
            timestamp: utc_timestamp(),
            mode,
            prompt_length: word_count(prompt),
        };

        let span = tracing::info_span!(
            "infer",
            mode = %mode,
            prompt_words = request.prompt_length,
            model = tracing::field::Empty,
            rule = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        self.run(request, prompt, explicit_model)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request: RequestMeta,
        prompt: &str,
        explicit_model: Option<&str>,
    ) -> Result<InferenceOutcome, RouterError> {
        let before = self.probe.sample().await;
        let decision = self.router.route(&before, prompt, request.mode, explicit_model);

        Span::current().record("model", decision.selected_model.as_str());
        Span::current().record("rule", decision.rule.as_str());
        metrics::inc_routed(&decision.selected_model, decision.rule.as_str());
        info!(
            model = %decision.selected_model,
            rule = decision.rule.as_str(),
            reason = %decision.decision_reason,
            "routed"
        );

        let (text, backend_ok, elapsed) = self.call_backend(&decision, prompt).await;

        let after = self.probe.sample().await;
        let record = InferenceRecord::assemble(
            request,
            &decision,
            elapsed.as_secs_f64(),
            word_count(&text),
            &before,
            &after,
        );

        if let Err(e) = self.recorder.append(&record).await {
            metrics::inc_log_write_failure();
            error!(error = %e, "inference record lost");
            return Err(e);
        }

        info!(
            latency_s = record.latency_s,
            output_tokens = record.output_tokens,
            throughput = record.throughput_tokens_per_s,
            "request complete"
        );

        Ok(InferenceOutcome {
            record,
            output: truncate_chars(text, self.response_max_chars),
            backend_ok,
        })
    }

    /// Call the backend once, bounded by the configured timeout.
    ///
    /// Returns the output (or diagnostic) text, success flag and elapsed
    /// wall time.
    async fn call_backend(
        &self,
        decision: &RoutingDecision,
        prompt: &str,
    ) -> (String, bool, Duration) {
        let model = decision.selected_model.as_str();
        let start = Instant::now();
        let result = match tokio::time::timeout(
            self.backend_timeout,
            self.worker.generate(model, prompt),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RouterError::Timeout(self.backend_timeout)),
        };
        let elapsed = start.elapsed();

        metrics::record_inference_latency(model, elapsed);
        Span::current().record("latency_ms", elapsed.as_millis() as u64);

        match result {
            Ok(text) => {
                Span::current().record("outcome", "ok");
                (text, true, elapsed)
            }
            Err(e) => {
                Span::current().record("outcome", "backend_err");
                metrics::inc_backend_error(model);
                warn!(error = %e, "backend call failed");
                (format!("[Error contacting backend: {e}]"), false, elapsed)
            }
        }
    }
}

/// Keep at most `max_chars` characters, cutting on a char boundary.
fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text,
    }
}
