//! Web API Server
//!
//! HTTP front end for the [`RequestOrchestrator`].
//!
//! ## Endpoints
//!
//! - `POST /infer`: Route, run and record one inference request (JSON)
//! - `GET  /api/v1/schema`: OpenAPI 3.0 schema
//! - `GET  /health`: Health check with per-model counters
//! - `GET  /metrics`: Prometheus metrics
//!
//! Every response carries an `X-Request-ID` header. A client-supplied value
//! is echoed back; otherwise a UUID v4 is generated. The id is attached to
//! the request's tracing span.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::routing::Mode;
use crate::{InferenceOutcome, InferenceRecord, RequestOrchestrator, RouterError};

// ============================================================================
// Types
// ============================================================================

/// JSON body for `POST /infer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferRequest {
    /// The prompt text.
    pub prompt: String,
    /// `cpu`, `gpu` or `adaptive` (default).
    #[serde(default)]
    pub mode: Mode,
    /// Explicit model override; a blank value is treated as absent.
    #[serde(default)]
    pub model: Option<String>,
}

/// JSON response body for `POST /infer`.
///
/// The full [`InferenceRecord`] is flattened into the top level, so
/// `latency_s`, `decision_reason` and the telemetry columns appear as
/// top-level keys alongside `output`, `model` and `backend_ok`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferResponse {
    /// The record that was appended to the log.
    #[serde(flatten)]
    pub record: InferenceRecord,
    /// Backend text or diagnostic message, truncated.
    pub output: String,
    /// Mirror of `selected_model`.
    pub model: String,
    /// `false` if the backend call failed or timed out.
    pub backend_ok: bool,
}

impl From<InferenceOutcome> for InferResponse {
    fn from(outcome: InferenceOutcome) -> Self {
        Self {
            model: outcome.record.selected_model.clone(),
            record: outcome.record,
            output: outcome.output,
            backend_ok: outcome.backend_ok,
        }
    }
}

/// Shared application state available to all handlers.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<RequestOrchestrator>,
}

// ============================================================================
// Server
// ============================================================================

/// Build the axum application without binding a socket.
///
/// `max_request_size` bounds request bodies; larger ones get 413.
pub fn router(orchestrator: Arc<RequestOrchestrator>, max_request_size: usize) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/infer", post(infer_handler))
        .route("/api/v1/schema", get(schema_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(middleware::from_fn_with_state(
            max_request_size,
            body_size_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web API server.
///
/// Binds to `config.host:config.port` and serves until the process exits.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_server(
    config: ServerConfig,
    orchestrator: Arc<RequestOrchestrator>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(orchestrator, config.max_request_size);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Router API ready on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Middleware
// ============================================================================

/// Propagates or generates `X-Request-ID` and runs the request inside a
/// span carrying it.
async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        req.headers_mut().insert("x-request-id", value.clone());
    }

    let span = tracing::info_span!(
        "http",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut response = next.run(req).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Rejects requests whose `Content-Length` exceeds `max_size` with 413.
async fn body_size_middleware(
    State(max_size): State<usize>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(content_length) = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
    {
        if content_length > max_size {
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(serde_json::json!({"error": "Request body too large"})),
            )
                .into_response();
        }
    }

    next.run(req).await
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /infer`: Route, run and record one request.
///
/// Backend failures still answer 200 with `backend_ok: false`. A failed log
/// append answers 500.
async fn infer_handler(
    State(state): State<AppState>,
    Json(req): Json<InferRequest>,
) -> Result<Json<InferResponse>, AppError> {
    let outcome = state
        .orchestrator
        .handle(&req.prompt, req.mode, req.model.as_deref())
        .await?;
    Ok(Json(outcome.into()))
}

/// `GET /health`: Health check endpoint.
async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let router = state.orchestrator.router();
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "models": {
            "cpu": router.cpu_model(),
            "gpu": router.gpu_model(),
        },
        "log_path": state.orchestrator.recorder().path().display().to_string(),
        "counters": crate::metrics::get_metrics_summary(),
    }))
}

/// `GET /metrics`: Prometheus metrics endpoint.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// `GET /api/v1/schema`: Serve the OpenAPI 3.0 schema.
async fn schema_handler() -> (
    StatusCode,
    [(header::HeaderName, &'static str); 1],
    &'static str,
) {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        OPENAPI_SCHEMA,
    )
}

/// Static OpenAPI 3.0 document.
const OPENAPI_SCHEMA: &str = r##"{
  "openapi": "3.0.0",
  "info": {
    "title": "adaptive-inference-router",
    "version": "1.0.0",
    "description": "Routes prompts to a CPU- or GPU-oriented model from live load and logs before/after telemetry"
  },
  "paths": {
    "/infer": {
      "post": {
        "summary": "Route and run one inference request",
        "requestBody": {
          "required": true,
          "content": {
            "application/json": {
              "schema": { "$ref": "#/components/schemas/InferRequest" }
            }
          }
        },
        "responses": {
          "200": { "description": "Inference record, output and backend status" },
          "413": { "description": "Request body too large" },
          "422": { "description": "Invalid request body or unknown mode" },
          "500": { "description": "Metrics log write failed" }
        }
      }
    },
    "/api/v1/schema": {
      "get": {
        "summary": "OpenAPI 3.0 schema",
        "responses": {
          "200": { "description": "This schema document" }
        }
      }
    },
    "/health": {
      "get": {
        "summary": "Health check",
        "responses": {
          "200": { "description": "Service healthy" }
        }
      }
    },
    "/metrics": {
      "get": {
        "summary": "Prometheus metrics",
        "responses": {
          "200": { "description": "Prometheus text format metrics" }
        }
      }
    }
  },
  "components": {
    "schemas": {
      "InferRequest": {
        "type": "object",
        "required": ["prompt"],
        "properties": {
          "prompt": { "type": "string" },
          "mode": { "type": "string", "enum": ["cpu", "gpu", "adaptive"], "default": "adaptive" },
          "model": { "type": "string", "nullable": true }
        }
      }
    }
  }
}"##;

// ============================================================================
// Error Type
// ============================================================================

/// Application-level errors returned by API handlers.
///
/// Each variant maps to an HTTP status code and a JSON error body.
#[derive(Debug)]
enum AppError {
    /// The inference record could not be persisted.
    LogWrite(String),
    /// Any other pipeline failure.
    Internal(String),
}

impl From<RouterError> for AppError {
    fn from(e: RouterError) -> Self {
        match e {
            RouterError::LogWrite { .. } => AppError::LogWrite(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (kind, detail) = match self {
            AppError::LogWrite(detail) => ("log_write_failed", detail),
            AppError::Internal(detail) => ("internal", detail),
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": kind, "detail": detail})),
        )
            .into_response()
    }
}

// ============================================================================
// Tests
// ============================================================================
