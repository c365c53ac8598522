//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`RouterConfig`] that cannot
//! be expressed through the type system alone.
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::RouterConfig;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "backend.timeout_secs").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl From<ConfigError> for crate::RouterError {
    fn from(e: ConfigError) -> Self {
        crate::RouterError::ConfigError(e.to_string())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Validate all semantic constraints on a [`RouterConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Errors
///
/// Returns every violation found.
pub fn validate(config: &RouterConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Server ───────────────────────────────────────────────────────
    if config.server.port == 0 {
        errors.push(invalid("server.port", 0, "must be between 1 and 65535"));
    }
    if config.server.response_max_chars == 0 {
        errors.push(invalid(
            "server.response_max_chars",
            0,
            "must be at least 1",
        ));
    }
    if config.server.max_request_size == 0 {
        errors.push(invalid("server.max_request_size", 0, "must be at least 1"));
    }

    // ── Backend ──────────────────────────────────────────────────────
    if config.backend.timeout_secs == 0 {
        errors.push(invalid("backend.timeout_secs", 0, "must be at least 1"));
    }
    if !(config.backend.url.starts_with("http://") || config.backend.url.starts_with("https://"))
    {
        errors.push(invalid(
            "backend.url",
            format!("{:?}", config.backend.url),
            "must be an http:// or https:// URL",
        ));
    }

    // ── Models ───────────────────────────────────────────────────────
    let cpu = config.models.cpu_model.trim();
    let gpu = config.models.gpu_model.trim();
    if cpu.is_empty() {
        errors.push(invalid("models.cpu_model", "\"\"", "must not be empty"));
    }
    if gpu.is_empty() {
        errors.push(invalid("models.gpu_model", "\"\"", "must not be empty"));
    }
    if !cpu.is_empty() && cpu == gpu {
        errors.push(invalid(
            "models.gpu_model",
            format!("{gpu:?}"),
            "must differ from models.cpu_model",
        ));
    }

    // ── Log ──────────────────────────────────────────────────────────
    if config.log.path.as_os_str().is_empty() {
        errors.push(invalid("log.path", "\"\"", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fields(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::InvalidField { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut config = RouterConfig::default();
        config.server.port = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["server.port"]);
    }

    #[test]
    fn test_response_max_chars_zero_rejected() {
        let mut config = RouterConfig::default();
        config.server.response_max_chars = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["server.response_max_chars"]);
    }

    #[test]
    fn test_max_request_size_zero_rejected() {
        let mut config = RouterConfig::default();
        config.server.max_request_size = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["server.max_request_size"]);
    }

    #[test]
    fn test_timeout_zero_rejected() {
        let mut config = RouterConfig::default();
        config.backend.timeout_secs = 0;
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["backend.timeout_secs"]);
    }

    #[test]
    fn test_non_http_backend_url_rejected() {
        let mut config = RouterConfig::default();
        config.backend.url = "127.0.0.1:11434".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["backend.url"]);
    }

    #[test]
    fn test_blank_models_rejected() {
        let mut config = RouterConfig::default();
        config.models.cpu_model = "  ".into();
        config.models.gpu_model = String::new();
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["models.cpu_model", "models.gpu_model"]);
    }

    #[test]
    fn test_identical_models_rejected() {
        let mut config = RouterConfig::default();
        config.models.gpu_model = "phi3".into();
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["models.gpu_model"]);
        assert!(errors[0].to_string().contains("must differ"));
    }

    #[test]
    fn test_empty_log_path_rejected() {
        let mut config = RouterConfig::default();
        config.log.path = PathBuf::new();
        let errors = validate(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["log.path"]);
    }

    #[test]
    fn test_all_errors_collected() {
        let mut config = RouterConfig::default();
        config.server.port = 0;
        config.backend.timeout_secs = 0;
        config.log.path = PathBuf::new();
        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_config_error_converts_to_router_error() {
        let err: crate::RouterError = invalid("server.port", 0, "bad").into();
        assert!(matches!(err, crate::RouterError::ConfigError(_)));
        assert!(err.to_string().contains("server.port"));
    }
}
