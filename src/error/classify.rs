//! Classification of raw failures into [`StandardError`].
//!
//! Failures arrive as a closed tagged union ([`RawError`]) so most
//! classification is exhaustive match arms. Keyword matching on message
//! text is kept only for truly opaque third-party values
//! (`RawError::Opaque`).

use serde_json::json;
use uuid::Uuid;

use crate::error::taxonomy::{
    epoch_ms, ErrorCategory, StandardError, RETRYABLE_STATUSES,
};
use crate::resilience::circuit_breaker::CircuitOpenError;

/// A failure below the taxonomy boundary.
///
/// Everything that can go wrong in a backend call or pipeline stage is one
/// of these before it becomes a [`StandardError`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum RawError {
    /// Already standardized; classification passes it through unchanged.
    #[error(transparent)]
    Standard(StandardError),

    /// An HTTP response with a failure status.
    #[error("http status {status}: {message}")]
    Http { status: u16, message: String },

    /// A transport-level problem (DNS, connect, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The call exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A protecting circuit refused the call.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// An opaque third-party error; classified by keyword matching.
    #[error("{0}")]
    Opaque(String),
}

impl From<StandardError> for RawError {
    fn from(err: StandardError) -> Self {
        Self::Standard(err)
    }
}

impl From<reqwest::Error> for RawError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else {
            Self::Opaque(err.to_string())
        }
    }
}

/// Context attached to every classification.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub source: String,
    pub correlation_id: String,
}

impl ErrorContext {
    pub fn new(source: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            correlation_id: correlation_id.into(),
        }
    }
}

/// Classify a raw failure into a [`StandardError`].
///
/// Idempotent: an already-standardized error passes through unchanged, so
/// double classification along nested call paths is harmless.
pub fn standardize(raw: RawError, ctx: &ErrorContext) -> StandardError {
    match raw {
        RawError::Standard(err) => err,
        RawError::Http { status, message } => from_status(status, message, ctx),
        RawError::Network(message) => {
            StandardError::from_category(ErrorCategory::NetworkError, message, &ctx.source, &ctx.correlation_id)
        }
        RawError::Timeout(message) => {
            StandardError::from_category(ErrorCategory::TimeoutError, message, &ctx.source, &ctx.correlation_id)
        }
        RawError::CircuitOpen(open) => {
            let retry_after = open.retry_after_ms;
            StandardError::from_category(
                ErrorCategory::ExternalServiceError,
                open.to_string(),
                &ctx.source,
                &ctx.correlation_id,
            )
            .with_retry_after(retry_after)
            .with_details(json!({ "circuit": open.key, "state": "open" }))
        }
        RawError::Opaque(message) => from_keywords(message, ctx),
    }
}

/// HTTP status → category mapping.
fn from_status(status: u16, message: String, ctx: &ErrorContext) -> StandardError {
    let category = match status {
        401 | 403 => ErrorCategory::AuthenticationError,
        429 => ErrorCategory::RateLimitError,
        422 => ErrorCategory::ValidationError,
        400..=499 => ErrorCategory::ClientError,
        _ => ErrorCategory::ServerError,
    };

    let mut err = StandardError {
        id: Uuid::new_v4().to_string(),
        severity: category.severity(&message),
        code: category.code().to_string(),
        user_message: category.user_message().to_string(),
        details: Some(json!({ "status": status })),
        timestamp_ms: epoch_ms(),
        source: ctx.source.clone(),
        correlation_id: ctx.correlation_id.clone(),
        // Status takes precedence over category for retryability.
        retryable: RETRYABLE_STATUSES.contains(&status),
        retry_after_ms: None,
        category,
        message,
    };
    if status == 429 {
        // No Retry-After value available here; callers that have one attach it.
        err.retryable = true;
    }
    err
}

/// Keyword-based classification for opaque error text.
fn from_keywords(message: String, ctx: &ErrorContext) -> StandardError {
    let lower = message.to_ascii_lowercase();
    let category = if lower.contains("timeout") || lower.contains("timed out") {
        ErrorCategory::TimeoutError
    } else if lower.contains("network") || lower.contains("fetch") || lower.contains("connection") {
        ErrorCategory::NetworkError
    } else if lower.contains("unauthorized") || lower.contains("forbidden") || lower.contains("token") {
        ErrorCategory::AuthenticationError
    } else if lower.contains("rate limit") {
        ErrorCategory::RateLimitError
    } else if lower.contains("validation") || lower.contains("invalid") || lower.contains("required") {
        ErrorCategory::ValidationError
    } else if lower.contains("database") || lower.contains("sql") {
        ErrorCategory::DatabaseError
    } else {
        ErrorCategory::ServerError
    };

    StandardError::from_category(category, message, &ctx.source, &ctx.correlation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ErrorContext {
        ErrorContext::new("test", "corr-1")
    }

    #[test]
    fn standardize_is_idempotent() {
        let original = StandardError::from_category(
            ErrorCategory::TimeoutError,
            "deadline exceeded",
            "voice",
            "corr-9",
        );
        let again = standardize(RawError::Standard(original.clone()), &ctx());
        assert_eq!(again.id, original.id);
        assert_eq!(again.category, original.category);
        assert_eq!(again.source, "voice");
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (401, ErrorCategory::AuthenticationError, false),
            (403, ErrorCategory::AuthenticationError, false),
            (422, ErrorCategory::ValidationError, false),
            (404, ErrorCategory::ClientError, false),
            (408, ErrorCategory::ClientError, true),
            (429, ErrorCategory::RateLimitError, true),
            (500, ErrorCategory::ServerError, true),
            (503, ErrorCategory::ServerError, true),
            // 5xx outside the retryable set: retrying cannot help.
            (501, ErrorCategory::ServerError, false),
            (505, ErrorCategory::ServerError, false),
        ];
        for (status, category, retryable) in cases {
            let err = standardize(
                RawError::Http { status, message: format!("status {status}") },
                &ctx(),
            );
            assert_eq!(err.category, category, "status {status}");
            assert_eq!(err.retryable, retryable, "status {status}");
        }
    }

    #[test]
    fn rate_limited_status_standardizes_retryable() {
        // End-to-end scenario: a 429 raw error becomes a retryable
        // RATE_LIMIT_ERROR with the templated user message.
        let err = standardize(
            RawError::Http { status: 429, message: "upstream said no".into() },
            &ctx(),
        );
        assert_eq!(err.category, ErrorCategory::RateLimitError);
        assert!(err.retryable);
        assert!(err.user_message.starts_with("Too many requests"));
        assert!(!err.user_message.contains("upstream"));
    }

    #[test]
    fn keyword_classification() {
        let cases = [
            ("operation timed out after 5s", ErrorCategory::TimeoutError),
            ("connection refused by peer", ErrorCategory::NetworkError),
            ("unauthorized access", ErrorCategory::AuthenticationError),
            ("rate limit exceeded", ErrorCategory::RateLimitError),
            ("invalid phone number", ErrorCategory::ValidationError),
            ("sql syntax error near SELECT", ErrorCategory::DatabaseError),
            ("something exploded", ErrorCategory::ServerError),
        ];
        for (message, category) in cases {
            let err = standardize(RawError::Opaque(message.into()), &ctx());
            assert_eq!(err.category, category, "message: {message}");
        }
    }

    #[test]
    fn classification_is_deterministic() {
        let a = standardize(RawError::Opaque("connection reset".into()), &ctx());
        let b = standardize(RawError::Opaque("connection reset".into()), &ctx());
        assert_eq!(a.category, b.category);
        assert_eq!(a.severity, b.severity);
        assert_eq!(a.retryable, b.retryable);
    }
}
