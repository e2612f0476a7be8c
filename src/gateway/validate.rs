//! Request validation: structure, size limits, injection-pattern scan.
//!
//! # Design Decisions
//! - Limits checked before any downstream work (early rejection)
//! - The pattern scan is substring-based over lowercased string fields;
//!   it is a tripwire against obvious payloads, not a WAF

use serde_json::Value;

use crate::config::schema::SecuritySettings;
use crate::gateway::request::GatewayRequest;

/// Patterns that reject a request outright when found in any string field.
const SUSPICIOUS_PATTERNS: [&str; 8] = [
    "<script",
    "javascript:",
    "onerror=",
    "union select",
    "drop table",
    "insert into",
    "delete from",
    "../",
];

/// Validate request structure and content.
pub fn validate_request(
    request: &GatewayRequest,
    security: &SecuritySettings,
) -> Result<(), String> {
    if request.endpoint.is_empty() {
        return Err("endpoint must not be empty".into());
    }
    if !request.endpoint.starts_with('/') {
        return Err("endpoint must start with '/'".into());
    }
    if request.endpoint.len() > security.max_endpoint_length {
        return Err(format!(
            "endpoint length {} exceeds limit {}",
            request.endpoint.len(),
            security.max_endpoint_length
        ));
    }
    if request.endpoint.contains("..") {
        return Err("endpoint contains a path traversal sequence".into());
    }

    if let Some(data) = &request.data {
        let serialized_len = serde_json::to_string(data)
            .map(|s| s.len())
            .unwrap_or(usize::MAX);
        if serialized_len > security.max_body_size {
            return Err(format!(
                "request body of {serialized_len} bytes exceeds limit {}",
                security.max_body_size
            ));
        }
        if security.strict_validation {
            scan_value(data)?;
        }
    }

    Ok(())
}

/// Recursively scan string fields for suspicious patterns.
fn scan_value(value: &Value) -> Result<(), String> {
    match value {
        Value::String(s) => {
            let lower = s.to_ascii_lowercase();
            for pattern in SUSPICIOUS_PATTERNS {
                if lower.contains(pattern) {
                    return Err(format!("suspicious pattern '{pattern}' in request data"));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(scan_value),
        Value::Object(map) => map.values().try_for_each(scan_value),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::request::HttpMethod;
    use serde_json::json;

    fn req(endpoint: &str) -> GatewayRequest {
        GatewayRequest::new(HttpMethod::Post, endpoint)
    }

    #[test]
    fn accepts_plain_request() {
        let request = req("/api/sms").with_data(json!({ "to": "+15550100", "body": "hi" }));
        assert!(validate_request(&request, &SecuritySettings::default()).is_ok());
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let security = SecuritySettings::default();
        assert!(validate_request(&req(""), &security).is_err());
        assert!(validate_request(&req("api/sms"), &security).is_err());
        assert!(validate_request(&req("/api/../internal"), &security).is_err());
    }

    #[test]
    fn rejects_oversized_body() {
        let mut security = SecuritySettings::default();
        security.max_body_size = 32;
        let request = req("/api/sms").with_data(json!({ "body": "x".repeat(100) }));
        assert!(validate_request(&request, &security).is_err());
    }

    #[test]
    fn rejects_injection_patterns_in_nested_fields() {
        let security = SecuritySettings::default();
        let request = req("/api/notes").with_data(json!({
            "note": { "items": ["ok", "<SCRIPT>alert(1)</script>"] }
        }));
        assert!(validate_request(&request, &security).is_err());

        let request = req("/api/notes").with_data(json!({ "q": "1; DROP TABLE users" }));
        assert!(validate_request(&request, &security).is_err());
    }

    #[test]
    fn scan_disabled_without_strict_validation() {
        let mut security = SecuritySettings::default();
        security.strict_validation = false;
        let request = req("/api/notes").with_data(json!({ "q": "drop table users" }));
        assert!(validate_request(&request, &security).is_ok());
    }
}
