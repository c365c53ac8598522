//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into a [`RouterConfig`], apply
//! environment overrides, and run validation before returning.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message
//!
//! ## Environment Variables
//!
//! - `ROUTER_CONFIG`: config path used when `--config` is not given
//! - `OLLAMA_URL`: overrides `backend.url`

use std::path::{Path, PathBuf};

use super::validation::{self, ConfigError};
use super::RouterConfig;

/// Load a [`RouterConfig`] from a TOML file.
///
/// # Errors
///
/// - [`ConfigError::Io`] if the file cannot be read.
/// - [`ConfigError::Parse`] if the TOML is malformed.
/// - [`ConfigError::Validation`] if semantic constraints are violated.
///
/// # Example
///
/// ```rust,no_run
/// use adaptive_inference_router::config::load_from_file;
/// use std::path::Path;
///
/// let config = load_from_file(Path::new("router.toml"))?;
/// println!("listening on port {}", config.server.port);
/// # Ok::<(), adaptive_inference_router::config::ConfigError>(())
/// ```
pub fn load_from_file(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load a [`RouterConfig`] from a TOML string.
///
/// `source_name` identifies the source in error messages.
///
/// # Errors
///
/// - [`ConfigError::Parse`] if the TOML is malformed.
/// - [`ConfigError::Validation`] if semantic constraints are violated.
pub fn load_from_str(content: &str, source_name: &str) -> Result<RouterConfig, ConfigError> {
    let mut config: RouterConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    apply_env_overrides(&mut config, std::env::var("OLLAMA_URL").ok());
    check(&config)?;
    Ok(config)
}

/// Load the config named by `path`, or defaults when `None`.
///
/// Defaults still receive environment overrides and validation.
///
/// # Errors
///
/// Same as [`load_from_file`].
pub fn load_or_default(path: Option<&Path>) -> Result<RouterConfig, ConfigError> {
    match path {
        Some(path) => load_from_file(path),
        None => load_from_str("", "<defaults>"),
    }
}

/// Resolve the config path from `--config <path>` / `--config=<path>` in
/// `args`, falling back to `ROUTER_CONFIG`.
pub fn config_path_from_args<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(value));
        }
    }
    std::env::var("ROUTER_CONFIG").ok().map(PathBuf::from)
}

fn apply_env_overrides(config: &mut RouterConfig, ollama_url: Option<String>) {
    if let Some(url) = ollama_url.filter(|u| !u.trim().is_empty()) {
        config.backend.url = url;
    }
    config.backend.url = config.backend.url.trim_end_matches('/').to_string();
}

fn check(config: &RouterConfig) -> Result<(), ConfigError> {
    validation::validate(config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })
}
