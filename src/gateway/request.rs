//! Gateway request/response contract.
//!
//! # Design Decisions
//! - `request_id` is a fresh identifier per call, independent of the
//!   orchestrator's correlation id
//! - The response is an envelope, never an exception: `success` plus
//!   exactly one of `data`/`error`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP-style method of a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Mutating methods require CSRF gating.
    pub fn is_mutating(self) -> bool {
        !matches!(self, Self::Get)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

/// Inbound contract from UI/business code.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: HttpMethod,
    pub endpoint: String,
    pub data: Option<Value>,
    pub headers: HashMap<String, String>,
    /// Overrides the configured per-request timeout.
    pub timeout: Option<Duration>,
    /// Overrides the configured max attempts.
    pub retries: Option<u32>,
    pub skip_auth: bool,
    pub skip_rate_limit: bool,
    /// Apply response shaping (masking, normalization).
    pub transform: bool,
}

impl GatewayRequest {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            data: None,
            headers: HashMap::new(),
            timeout: None,
            retries: None,
            skip_auth: false,
            skip_rate_limit: false,
            transform: true,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Rate-limit identity: explicit client header, else anonymous.
    pub fn client_identifier(&self) -> &str {
        self.header("x-client-id").unwrap_or("anonymous")
    }
}

/// Error body inside the response envelope. `message` is always the
/// templated user message; the internal one surfaces only through `stack`
/// in debug builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Rate-limit signaling, the header-equivalent of
/// `X-RateLimit-Limit/Remaining/Reset` and `Retry-After`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitMeta {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Per-response metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp_ms: u64,
    pub duration_ms: u64,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitMeta>,
}

/// Outbound envelope: the gateway's only way of answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: ResponseMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let req = GatewayRequest::new(HttpMethod::Post, "/api/calls")
            .with_header("X-CSRF-Token", "tok-1");
        assert_eq!(req.header("x-csrf-token"), Some("tok-1"));
        assert_eq!(req.header("X-Csrf-Token"), Some("tok-1"));
    }

    #[test]
    fn client_identifier_defaults_to_anonymous() {
        let req = GatewayRequest::new(HttpMethod::Get, "/api/calls");
        assert_eq!(req.client_identifier(), "anonymous");
        let req = req.with_header("x-client-id", "user-7");
        assert_eq!(req.client_identifier(), "user-7");
    }

    #[test]
    fn mutating_methods() {
        assert!(!HttpMethod::Get.is_mutating());
        assert!(HttpMethod::Post.is_mutating());
        assert!(HttpMethod::Delete.is_mutating());
    }
}
