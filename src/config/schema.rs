//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from config
//! files, and all fields have defaults so minimal configs work.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::taxonomy::RetryConfig;
use crate::resilience::circuit_breaker::CircuitBreakerConfig;
use crate::resilience::rate_limit::RateLimiterConfig;

/// Root configuration for the service gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Rate limiting settings.
    pub rate_limit: RateLimitSettings,

    /// Circuit breaker defaults for the registry.
    pub circuit_breaker: CircuitBreakerSettings,

    /// Retry policy defaults.
    pub retry: RetrySettings,

    /// Timeout configuration.
    pub timeouts: TimeoutSettings,

    /// Request validation and auth gating.
    pub security: SecuritySettings,

    /// Fallback cache settings.
    pub cache: CacheSettings,

    /// Observability settings.
    pub observability: ObservabilitySettings,

    /// Named backend service definitions.
    pub services: Vec<ServiceConfig>,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed-window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per window (also burst capacity).
    pub max_requests: u32,

    /// Background sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
            sweep_interval_secs: 300,
        }
    }
}

impl From<&RateLimitSettings> for RateLimiterConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            window: Duration::from_millis(settings.window_ms),
            max_requests: settings.max_requests,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    /// Windowed failures required to open a circuit.
    pub failure_threshold: usize,

    /// Cooldown before a probe is allowed, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Failure/success counting window in milliseconds.
    pub monitoring_period_ms: u64,

    /// Minimum windowed throughput before the threshold can trip.
    pub minimum_throughput: usize,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
            monitoring_period_ms: 10_000,
            minimum_throughput: 10,
        }
    }
}

impl From<&CircuitBreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &CircuitBreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_millis(settings.recovery_timeout_ms),
            monitoring_period: Duration::from_millis(settings.monitoring_period_ms),
            minimum_throughput: settings.minimum_throughput,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of attempts (first call included).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Multiplier applied per attempt.
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay_ms: settings.base_delay_ms,
            max_delay_ms: settings.max_delay_ms,
            backoff_factor: settings.backoff_factor,
            ..RetryConfig::default()
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Per-request execution timeout in seconds.
    pub request_secs: u64,

    /// Per-item timeout inside batch execution in seconds.
    pub batch_item_secs: u64,

    /// Health probe timeout in seconds.
    pub probe_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            request_secs: 30,
            batch_item_secs: 30,
            probe_secs: 5,
        }
    }
}

/// Request validation and authentication gating.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Endpoint prefixes exempt from authentication.
    pub auth_whitelist: Vec<String>,

    /// Require a CSRF token header on mutating methods.
    pub require_csrf: bool,

    /// Maximum serialized request body size in bytes.
    pub max_body_size: usize,

    /// Maximum endpoint path length.
    pub max_endpoint_length: usize,

    /// Enable the injection-pattern scan over string fields.
    pub strict_validation: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            auth_whitelist: vec!["/health".to_string(), "/public".to_string()],
            require_csrf: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
            max_endpoint_length: 2048,
            strict_validation: true,
        }
    }
}

/// Fallback cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Time-to-live for cached responses in seconds.
    pub ttl_secs: u64,

    /// Background sweep interval in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300, // 5 minutes
            sweep_interval_secs: 300,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Fraction of successful requests that get a detail log entry.
    pub log_sample_rate: f64,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            log_sample_rate: 0.1,
        }
    }
}

/// Whether a service runs in-process logic or fronts an external backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Persistence reads/writes and other in-process operations:
    /// retried, but never circuit-broken or cached.
    Internal,
    /// Unreliable external backend: circuit-broken with cache fallback.
    External,
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service identifier (e.g. "voice", "sms", "maps").
    pub name: String,

    /// Internal or external routing policy.
    pub kind: ServiceKind,

    /// Base URL for HTTP-backed services.
    pub base_url: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,

    /// Path probed by the health surface.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

fn default_service_timeout() -> u64 {
    10
}

fn default_health_path() -> String {
    "/health".to_string()
}
