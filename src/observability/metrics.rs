//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by endpoint, outcome
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): denials by endpoint, check
//! - `gateway_retries_total` (counter): retry attempts by source
//! - `gateway_errors_total` (counter): standardized errors by source, code
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_cache_lookups_total` (counter): fallback cache hits/misses
//! - `gateway_cache_size` (gauge): cached entries
//! - `gateway_batch_operations_total` (counter): batch items by outcome
//!
//! # Design Decisions
//! - Low-overhead updates through the `metrics` facade
//! - Prometheus exposition is optional and bound once at startup

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one gateway request with its outcome code and latency.
pub fn record_request(endpoint: &str, outcome: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome.to_string(),
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "endpoint" => endpoint.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(endpoint: &str, check: &'static str) {
    metrics::counter!(
        "gateway_rate_limited_total",
        "endpoint" => endpoint.to_string(),
        "check" => check,
    )
    .increment(1);
}

pub fn record_retry(source: &str) {
    metrics::counter!("gateway_retries_total", "source" => source.to_string()).increment(1);
}

pub fn record_error(source: &str, code: &str) {
    metrics::counter!(
        "gateway_errors_total",
        "source" => source.to_string(),
        "code" => code.to_string(),
    )
    .increment(1);
}

pub fn record_breaker_state(key: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    metrics::gauge!("gateway_breaker_state", "key" => key.to_string()).set(value);
}

pub fn record_cache_lookup(hit: bool) {
    let outcome = if hit { "hit" } else { "miss" };
    metrics::counter!("gateway_cache_lookups_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_size(size: usize) {
    metrics::gauge!("gateway_cache_size").set(size as f64);
}

pub fn record_batch_item(outcome: &'static str) {
    metrics::counter!("gateway_batch_operations_total", "outcome" => outcome).increment(1);
}
