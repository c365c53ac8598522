//! Model worker abstraction and implementations
//!
//! Provides the ModelWorker trait and its implementations:
//! - OllamaWorker: Ollama-compatible `/api/generate` text-generation server
//! - EchoWorker: Testing/demo worker
//!
//! ## Environment Variables
//!
//! - `OLLAMA_URL`: backend base URL (default: http://127.0.0.1:11434)

use crate::RouterError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default backend base URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default bound on a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Trait for text-generation backends
///
/// Implementations must be thread-safe (Send + Sync) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via Arc<dyn ModelWorker>.
#[async_trait]
pub trait ModelWorker: Send + Sync {
    /// Generate text for `prompt` with the backend model named `model`.
    ///
    /// Returns the full generated text on success.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, RouterError>;
}

// ============================================================================
// Echo Worker (Testing)
// ============================================================================

/// Dummy echo worker for testing
///
/// Returns the prompt unchanged after a simulated delay. Useful for running
/// the service without a real model backend.
pub struct EchoWorker {
    /// Simulated inference delay
    pub delay_ms: u64,
}

impl EchoWorker {
    /// Create an echo worker with a 10 ms delay.
    pub fn new() -> Self {
        Self { delay_ms: 10 }
    }

    /// Create an echo worker with a custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self { delay_ms }
    }
}

impl Default for EchoWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelWorker for EchoWorker {
    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, RouterError> {
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(prompt.to_string())
    }
}

// ============================================================================
// Ollama Worker
// ============================================================================

/// Ollama `/api/generate` request payload
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// Ollama `/api/generate` non-streaming response
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

/// Ollama-compatible HTTP worker
///
/// Server URL can be set via the OLLAMA_URL environment variable
/// or defaults to http://127.0.0.1:11434
///
/// ## Example
///
/// ```no_run
/// use adaptive_inference_router::OllamaWorker;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let worker = Arc::new(
///     OllamaWorker::new()
///         .with_url("http://gpu-box:11434")
///         .with_timeout(Duration::from_secs(60))
/// );
/// ```
pub struct OllamaWorker {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl OllamaWorker {
    /// Create a new Ollama worker
    ///
    /// Reads server URL from OLLAMA_URL environment variable,
    /// or defaults to http://127.0.0.1:11434
    pub fn new() -> Self {
        let url = std::env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            url,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set server base URL (without the `/api/generate` path)
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for OllamaWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelWorker for OllamaWorker {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, RouterError> {
        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e, "request failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RouterError::Inference(format!(
                "backend error {}: {}",
                status, error_text
            )));
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| self.classify(e, "failed to parse response"))?;

        Ok(api_response.response.trim().to_string())
    }
}

impl OllamaWorker {
    fn classify(&self, e: reqwest::Error, context: &str) -> RouterError {
        if e.is_timeout() {
            RouterError::Timeout(self.timeout)
        } else {
            RouterError::Inference(format!("{context}: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_worker_returns_prompt() {
        let worker = EchoWorker::with_delay(1);
        let result = worker.generate("any", "hello world").await.unwrap();
        assert_eq!(result, "hello world");
    }

    #[test]
    fn test_with_url_strips_trailing_slash() {
        let worker = OllamaWorker::new().with_url("http://localhost:11434/");
        assert_eq!(worker.url(), "http://localhost:11434");
    }

    #[test]
    fn test_default_timeout_is_120_seconds() {
        assert_eq!(OllamaWorker::new().timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_request_payload_disables_streaming() {
        let body = serde_json::to_value(OllamaRequest {
            model: "phi3",
            prompt: "hi",
            stream: false,
        })
        .unwrap();
        assert_eq!(body["model"], "phi3");
        assert_eq!(body["stream"], false);
    }
}
