//! Response shaping: sensitive-field masking, timestamp normalization,
//! and field-name standardization.
//!
//! # Design Decisions
//! - Masking is key-name based; value heuristics are too error-prone
//! - Timestamps normalize to RFC 3339; epoch numbers are interpreted as
//!   seconds below 10^12 and milliseconds above
//! - Field names standardize to snake_case

use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};

const MASK: &str = "***";

/// Key fragments whose values are always masked.
const SENSITIVE_KEY_FRAGMENTS: [&str; 8] = [
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "private_key",
];

/// Keys treated as timestamps for normalization.
fn is_timestamp_key(key: &str) -> bool {
    key == "timestamp" || key.ends_with("_at") || key.contains("date")
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}

/// camelCase / PascalCase → snake_case. Already-snake keys pass through.
fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn normalize_timestamp(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => {
            let epoch = n.as_i64()?;
            let dt = if epoch >= 1_000_000_000_000 {
                Utc.timestamp_millis_opt(epoch).single()?
            } else {
                Utc.timestamp_opt(epoch, 0).single()?
            };
            Some(Value::String(dt.to_rfc3339()))
        }
        Value::String(s) => {
            let dt = chrono::DateTime::parse_from_rfc3339(s).ok()?;
            Some(Value::String(dt.with_timezone(&Utc).to_rfc3339()))
        }
        _ => None,
    }
}

/// Apply the full shaping pass to a response payload.
pub fn transform_payload(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                let normalized = normalize_key(&key);
                let shaped = if is_sensitive_key(&normalized) {
                    Value::String(MASK.to_string())
                } else if is_timestamp_key(&normalized) {
                    normalize_timestamp(&inner).unwrap_or_else(|| transform_payload(inner))
                } else {
                    transform_payload(inner)
                };
                out.insert(normalized, shaped);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(transform_payload).collect()),
        other => other,
    }
}
