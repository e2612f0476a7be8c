//! Orchestration context and the uniform service response envelope.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::taxonomy::StandardError;

/// Identity of one logical request, threaded through every sub-call,
/// log line, and cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationContext {
    /// Unique per logical request; distinct from the gateway's per-call
    /// request id.
    pub correlation_id: String,
    /// Originating component (page, job, API surface).
    pub source: String,
    /// Operation name being performed.
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl OrchestrationContext {
    pub fn new(source: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            source: source.into(),
            operation: operation.into(),
            user_id: None,
            client_id: None,
            priority: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Stable serialization used in fallback-cache keys. Deliberately
    /// excludes the correlation id so repeat requests share entries.
    pub fn cache_key_part(&self) -> String {
        format!(
            "{}:{}",
            self.user_id.as_deref().unwrap_or("-"),
            self.client_id.as_deref().unwrap_or("-"),
        )
    }
}

/// Metadata attached to every orchestrator response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub correlation_id: String,
    pub duration_ms: u64,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
}

/// The uniform envelope returned by every orchestrator entry point.
/// Exactly one of `data`/`error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StandardError>,
    pub metadata: ResponseMetadata,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn err(error: StandardError, metadata: ResponseMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            metadata,
        }
    }
}
