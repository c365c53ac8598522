//! Router service binary.
//!
//! Loads the TOML config, builds the probe/router/worker/recorder stack and
//! serves the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! router --config router.toml
//! ROUTER_CONFIG=router.toml router
//! router --print-schema > router.schema.json
//! ```
//!
//! ## Environment Variables
//!
//! - `ROUTER_CONFIG`: config path when `--config` is absent
//! - `OLLAMA_URL`: overrides `backend.url`
//! - `LOG_FORMAT=json`: structured JSON output (overrides the config file)
//! - `RUST_LOG=info`: log level filter (default: info)

use std::sync::Arc;

use adaptive_inference_router::config::{self, loader};
use adaptive_inference_router::{
    init_tracing_as, metrics, web_api, MetricsRecorder, ModelRouter, ModelWorker, OllamaWorker,
    RequestOrchestrator, RouterError, SystemProbe, TelemetryProbe,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--print-schema") {
        println!("{}", config::export_schema()?);
        return Ok(());
    }

    let config_path = loader::config_path_from_args(args.into_iter().skip(1));
    let config = loader::load_or_default(config_path.as_deref()).map_err(RouterError::from)?;

    let format = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| config.observability.log_format.as_str().to_string());
    let _ = init_tracing_as(&format);
    metrics::init_metrics()?;

    info!(
        config = %config_path
            .as_ref()
            .map_or_else(|| "<defaults>".to_string(), |p| p.display().to_string()),
        backend = %config.backend.url,
        cpu_model = %config.models.cpu_model,
        gpu_model = %config.models.gpu_model,
        log = %config.log.path.display(),
        "Starting adaptive-inference-router"
    );

    let probe = SystemProbe::new(config.telemetry.gpu, config.telemetry.gpu_index);
    probe.prime().await;
    let probe: Arc<dyn TelemetryProbe> = Arc::new(probe);

    let recorder = Arc::new(MetricsRecorder::new(&config.log.path));
    recorder.ensure_log().await?;

    let worker: Arc<dyn ModelWorker> = Arc::new(
        OllamaWorker::new()
            .with_url(&config.backend.url)
            .with_timeout(config.backend.timeout()),
    );

    let orchestrator = Arc::new(
        RequestOrchestrator::new(
            probe,
            ModelRouter::new(config.models.clone()),
            worker,
            recorder,
        )
        .with_backend_timeout(config.backend.timeout())
        .with_response_max_chars(config.server.response_max_chars),
    );

    web_api::start_server(config.server, orchestrator).await
}
