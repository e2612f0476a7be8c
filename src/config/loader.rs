//! Configuration loading from disk.
//!
//! A failed load is a configuration error: callers halt startup rather
//! than retrying.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!(path = %path.display(), services = config.services.len(), "Configuration loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let toml = r#"
            [rate_limit]
            window_ms = 1000
            max_requests = 5

            [[services]]
            name = "voice"
            kind = "external"
            base_url = "https://voice.example.com"
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].timeout_secs, 10); // default
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn invalid_values_fail_validation() {
        let toml = r#"
            [retry]
            max_attempts = 0
        "#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert!(validate_config(&config).is_err());
    }
}
