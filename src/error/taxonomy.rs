//! Error taxonomy: the closed vocabulary every failure is mapped into.
//!
//! # Design Decisions
//! - Category and severity are always assigned together; severity is a
//!   function of category, never set independently
//! - `user_message` is templated per category so backend internals never
//!   leak to callers
//! - Retryability is derived from category (plus HTTP status for
//!   status-bearing failures), not decided ad hoc at call sites

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Failure categories. Every raw error is classified into exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    ClientError,
    ServerError,
    NetworkError,
    TimeoutError,
    ValidationError,
    AuthenticationError,
    RateLimitError,
    ExternalServiceError,
    DatabaseError,
    ConfigurationError,
}

impl ErrorCategory {
    /// Stable machine-readable code for the category.
    pub fn code(self) -> &'static str {
        match self {
            Self::ClientError => "CLIENT_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::RateLimitError => "RATE_LIMIT_ERROR",
            Self::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
        }
    }

    /// Deterministic category → severity mapping.
    ///
    /// Network and timeout failures escalate to HIGH when the message
    /// signals a critical path.
    pub fn severity(self, message: &str) -> ErrorSeverity {
        match self {
            Self::ValidationError | Self::ClientError => ErrorSeverity::Low,
            Self::AuthenticationError | Self::RateLimitError => ErrorSeverity::Medium,
            Self::DatabaseError | Self::ExternalServiceError => ErrorSeverity::High,
            Self::ConfigurationError => ErrorSeverity::Critical,
            Self::NetworkError | Self::TimeoutError | Self::ServerError => {
                if message.to_ascii_lowercase().contains("critical") {
                    ErrorSeverity::High
                } else {
                    ErrorSeverity::Medium
                }
            }
        }
    }

    /// Whether failures in this category are worth retrying at all.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkError
                | Self::TimeoutError
                | Self::ServerError
                | Self::ExternalServiceError
        )
    }

    /// Caller-facing message template. Never includes internal details.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::ClientError => "The request could not be processed. Please check your input.",
            Self::ServerError => "Something went wrong on our side. Please try again shortly.",
            Self::NetworkError => "A network problem occurred. Please check your connection and retry.",
            Self::TimeoutError => "The operation took too long to complete. Please try again.",
            Self::ValidationError => "Some fields are invalid or missing. Please review and resubmit.",
            Self::AuthenticationError => "You are not authorized to perform this action.",
            Self::RateLimitError => "Too many requests. Please slow down and try again later.",
            Self::ExternalServiceError => "An external service is currently unavailable. Please try again later.",
            Self::DatabaseError => "A data access problem occurred. Please try again shortly.",
            Self::ConfigurationError => "The service is misconfigured. Please contact support.",
        }
    }
}

/// Severity levels, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// HTTP statuses that are retryable regardless of mapped category.
///
/// For status-bearing failures this list takes precedence over the
/// category: 5xx statuses outside it (501 Not Implemented, 505, ...)
/// signal conditions a retry cannot fix and stay non-retryable even
/// though they classify as SERVER_ERROR.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// The single standardized error value used above the raw-failure boundary.
///
/// Created once per raw failure by the classifier, then passed by value.
///
/// Display and Error are implemented by hand: the `source` field holds the
/// originating component name, which the thiserror derive would otherwise
/// treat as an error cause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardError {
    /// Unique id for this error instance.
    pub id: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    /// Machine-readable code, usually the category code.
    pub code: String,
    /// Internal message for logs and diagnostics.
    pub message: String,
    /// Templated caller-facing message.
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Epoch milliseconds at classification time.
    pub timestamp_ms: u64,
    /// Component or service that produced the failure.
    pub source: String,
    /// Correlation id of the logical request this failure belongs to.
    pub correlation_id: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl StandardError {
    /// Build a StandardError directly from a category, for failures that
    /// originate inside the gateway itself (validation, auth, rate limit).
    pub fn from_category(
        category: ErrorCategory,
        message: impl Into<String>,
        source: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        let message = message.into();
        Self {
            id: Uuid::new_v4().to_string(),
            severity: category.severity(&message),
            code: category.code().to_string(),
            user_message: category.user_message().to_string(),
            details: None,
            timestamp_ms: epoch_ms(),
            source: source.into(),
            correlation_id: correlation_id.into(),
            retryable: category.is_retryable(),
            retry_after_ms: None,
            category,
            message,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retry_after(mut self, retry_after_ms: u64) -> Self {
        self.retry_after_ms = Some(retry_after_ms);
        self
    }
}

impl std::fmt::Display for StandardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.source, self.code, self.message)
    }
}

impl std::error::Error for StandardError {}

/// Retry policy supplied per call site or defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    /// Categories eligible for retry at this call site. A failure must be
    /// both inherently retryable and listed here to be retried.
    pub retryable_categories: Vec<ErrorCategory>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            retryable_categories: vec![
                ErrorCategory::NetworkError,
                ErrorCategory::TimeoutError,
                ErrorCategory::ServerError,
                ErrorCategory::ExternalServiceError,
            ],
        }
    }
}

/// Current time as epoch milliseconds.
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping_is_deterministic() {
        assert_eq!(
            ErrorCategory::ValidationError.severity("bad field"),
            ErrorSeverity::Low
        );
        assert_eq!(
            ErrorCategory::RateLimitError.severity("slow down"),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorCategory::DatabaseError.severity("conn refused"),
            ErrorSeverity::High
        );
        assert_eq!(
            ErrorCategory::ConfigurationError.severity("missing key"),
            ErrorSeverity::Critical
        );
        // Keyword escalation for network/timeout.
        assert_eq!(
            ErrorCategory::NetworkError.severity("link down"),
            ErrorSeverity::Medium
        );
        assert_eq!(
            ErrorCategory::NetworkError.severity("CRITICAL path unreachable"),
            ErrorSeverity::High
        );
    }

    #[test]
    fn retryable_categories() {
        assert!(ErrorCategory::NetworkError.is_retryable());
        assert!(ErrorCategory::TimeoutError.is_retryable());
        assert!(ErrorCategory::ServerError.is_retryable());
        assert!(ErrorCategory::ExternalServiceError.is_retryable());
        assert!(!ErrorCategory::ValidationError.is_retryable());
        assert!(!ErrorCategory::AuthenticationError.is_retryable());
        assert!(!ErrorCategory::ConfigurationError.is_retryable());
    }

    #[test]
    fn user_message_never_echoes_internal_message() {
        let err = StandardError::from_category(
            ErrorCategory::DatabaseError,
            "pg: relation \"secret_table\" does not exist",
            "store",
            "corr-1",
        );
        assert!(!err.user_message.contains("secret_table"));
        assert_eq!(err.code, "DATABASE_ERROR");
    }
}
