//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges (timeouts > 0, sane thresholds)
//! - Detect duplicate service names and malformed whitelist entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before the config is accepted into the system; failures are
//!   configuration errors and abort startup instead of being retried

use std::collections::HashSet;

use crate::config::schema::GatewayConfig;

/// One semantic violation in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be between 0 and 1 (got {value})")]
    RatioOutOfRange { field: &'static str, value: String },

    #[error("duplicate service name '{name}'")]
    DuplicateService { name: String },

    #[error("service '{name}' has an empty base_url")]
    EmptyBaseUrl { name: String },

    #[error("service '{name}' base_url must start with http:// or https://")]
    MalformedBaseUrl { name: String },

    #[error("auth whitelist entry '{entry}' must start with '/'")]
    MalformedWhitelistEntry { entry: String },
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let zero_checks: [(&'static str, bool); 9] = [
        ("rate_limit.window_ms", config.rate_limit.window_ms == 0),
        ("rate_limit.max_requests", config.rate_limit.max_requests == 0),
        (
            "circuit_breaker.failure_threshold",
            config.circuit_breaker.failure_threshold == 0,
        ),
        (
            "circuit_breaker.recovery_timeout_ms",
            config.circuit_breaker.recovery_timeout_ms == 0,
        ),
        (
            "circuit_breaker.monitoring_period_ms",
            config.circuit_breaker.monitoring_period_ms == 0,
        ),
        ("retry.max_attempts", config.retry.max_attempts == 0),
        ("timeouts.request_secs", config.timeouts.request_secs == 0),
        ("timeouts.batch_item_secs", config.timeouts.batch_item_secs == 0),
        ("security.max_body_size", config.security.max_body_size == 0),
    ];
    for (field, is_zero) in zero_checks {
        if is_zero {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    if config.retry.backoff_factor < 1.0 {
        errors.push(ValidationError::RatioOutOfRange {
            field: "retry.backoff_factor (must be >= 1)",
            value: config.retry.backoff_factor.to_string(),
        });
    }
    let sample = config.observability.log_sample_rate;
    if !(0.0..=1.0).contains(&sample) {
        errors.push(ValidationError::RatioOutOfRange {
            field: "observability.log_sample_rate",
            value: sample.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for service in &config.services {
        if !seen.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService { name: service.name.clone() });
        }
        if service.base_url.is_empty() {
            errors.push(ValidationError::EmptyBaseUrl { name: service.name.clone() });
        } else if !service.base_url.starts_with("http://")
            && !service.base_url.starts_with("https://")
        {
            errors.push(ValidationError::MalformedBaseUrl { name: service.name.clone() });
        }
    }

    for entry in &config.security.auth_whitelist {
        if !entry.starts_with('/') {
            errors.push(ValidationError::MalformedWhitelistEntry { entry: entry.clone() });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
