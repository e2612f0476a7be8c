//! ErrorHandler: the single place raw failures become [`StandardError`]s
//! and retry/breaker policy is applied.
//!
//! # Responsibilities
//! - Standardize every failure and track per-(source, code) frequency
//! - Drive the retry loop with exponential backoff + jitter
//! - Own the registry of circuit breakers, keyed by operation name
//! - Fire-and-forget CRITICAL alerts to an optional sink
//!
//! # Design Decisions
//! - The registry is an injected object, not module-level state; tests get
//!   fresh instances
//! - Alert delivery failures are logged and never affect the original
//!   error's propagation

use async_trait::async_trait;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::classify::{standardize, ErrorContext, RawError};
use crate::error::taxonomy::{epoch_ms, ErrorSeverity, RetryConfig, StandardError};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::circuit_breaker::{
    BreakerMetrics, CircuitBreaker, CircuitBreakerConfig,
};

/// Errors per hour from one (source, code) pair before a pattern warning
/// is emitted. Observability signal only, not an enforcement gate.
const PATTERN_THRESHOLD: u32 = 10;
const FREQUENCY_WINDOW_MS: u64 = 60 * 60 * 1000;

/// Receiver for CRITICAL-severity notifications.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, error: StandardError);
}

struct FrequencyBucket {
    window_start_ms: u64,
    count: u32,
}

/// Classifies failures, applies retry policy, and fronts the breaker
/// registry. One instance is constructed at startup and shared by
/// reference through the gateway and orchestrator.
pub struct ErrorHandler {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    breaker_defaults: CircuitBreakerConfig,
    frequency: DashMap<String, FrequencyBucket>,
    alert_sink: Option<Arc<dyn AlertSink>>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::with_breaker_defaults(CircuitBreakerConfig::default())
    }

    pub fn with_breaker_defaults(breaker_defaults: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            breaker_defaults,
            frequency: DashMap::new(),
            alert_sink: None,
        }
    }

    /// Attach a sink for CRITICAL notifications.
    pub fn set_alert_sink(&mut self, sink: Arc<dyn AlertSink>) {
        self.alert_sink = Some(sink);
    }

    /// Classify a raw failure, track its frequency, and dispatch critical
    /// alerts. Idempotent for already-standardized errors.
    pub fn standardize(&self, raw: RawError, ctx: &ErrorContext) -> StandardError {
        let err = standardize(raw, ctx);
        self.track_frequency(&err);
        metrics::record_error(&err.source, err.code.as_str());

        if err.severity == ErrorSeverity::Critical {
            if let Some(sink) = self.alert_sink.clone() {
                // Best effort: the original error propagates regardless of
                // what happens to the notification.
                let alert = err.clone();
                tokio::spawn(async move {
                    sink.notify(alert).await;
                });
            }
            tracing::error!(
                source = %err.source,
                code = %err.code,
                correlation_id = %err.correlation_id,
                "Critical error: {}",
                err.message
            );
        }
        err
    }

    /// Run `op` with the retry policy: at most `max_attempts` invocations,
    /// backoff with jitter between them, and only for failures whose
    /// category is both inherently retryable and listed in the config.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        ctx: &ErrorContext,
        config: &RetryConfig,
        op: F,
    ) -> Result<T, StandardError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        let max_attempts = config.max_attempts.max(1);
        let mut last_error: Option<StandardError> = None;

        for attempt in 1..=max_attempts {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(raw) => {
                    let err = self.standardize(raw, ctx);
                    let give_up = !err.retryable
                        || !config.retryable_categories.contains(&err.category)
                        || attempt == max_attempts;
                    if give_up {
                        if attempt > 1 {
                            tracing::warn!(
                                source = %ctx.source,
                                attempts = attempt,
                                code = %err.code,
                                "Giving up after retries"
                            );
                        }
                        return Err(err);
                    }

                    let delay = calculate_backoff(
                        attempt,
                        config.base_delay_ms,
                        config.max_delay_ms,
                        config.backoff_factor,
                    );
                    tracing::info!(
                        source = %ctx.source,
                        attempt,
                        delay = ?delay,
                        code = %err.code,
                        "Retrying after failure"
                    );
                    metrics::record_retry(&ctx.source);
                    last_error = Some(err);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Unreachable: the loop always returns on the final attempt.
        Err(last_error.expect("retry loop exited without an error"))
    }

    /// Get or lazily create the breaker for `key`.
    pub fn breaker(&self, key: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(key, self.breaker_defaults.clone()))
            })
            .clone()
    }

    /// Run `op` under the breaker registered for `key`, failing fast with a
    /// circuit-open error when the circuit refuses the call.
    pub async fn execute_with_breaker<T, F, Fut>(
        &self,
        key: &str,
        ctx: &ErrorContext,
        op: F,
    ) -> Result<T, StandardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
    {
        let breaker = self.breaker(key);
        breaker
            .execute(op)
            .await
            .map_err(|raw| self.standardize(raw, ctx))
    }

    /// Breaker-protected call with a fallback invoked when the circuit is
    /// open before or as a result of this call.
    pub async fn execute_with_breaker_fallback<T, F, Fut, FB, FbFut>(
        &self,
        key: &str,
        ctx: &ErrorContext,
        op: F,
        fallback: FB,
    ) -> Result<T, StandardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RawError>>,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<T, RawError>>,
    {
        let breaker = self.breaker(key);
        breaker
            .execute_with_fallback(op, fallback)
            .await
            .map_err(|raw| self.standardize(raw, ctx))
    }

    /// Metrics snapshot of every registered breaker, for the health surface.
    pub fn breaker_states(&self) -> Vec<(String, BreakerMetrics)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics()))
            .collect()
    }

    /// Administratively reset one breaker, if registered.
    pub fn reset_breaker(&self, key: &str) -> bool {
        match self.breakers.get(key) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    fn track_frequency(&self, err: &StandardError) {
        let key = format!("{}:{}", err.source, err.code);
        let now = epoch_ms();
        let mut bucket = self.frequency.entry(key.clone()).or_insert(FrequencyBucket {
            window_start_ms: now,
            count: 0,
        });
        if now.saturating_sub(bucket.window_start_ms) > FREQUENCY_WINDOW_MS {
            bucket.window_start_ms = now;
            bucket.count = 0;
        }
        bucket.count += 1;
        if bucket.count == PATTERN_THRESHOLD + 1 {
            tracing::warn!(
                source = %err.source,
                code = %err.code,
                count = bucket.count,
                "Error pattern detected: repeated failures within the hour"
            );
        }
    }

    /// Current hourly count for a (source, code) pair. Inspection hook for
    /// dashboards and tests.
    pub fn error_frequency(&self, source: &str, code: &str) -> u32 {
        self.frequency
            .get(&format!("{source}:{code}"))
            .map(|bucket| bucket.count)
            .unwrap_or(0)
    }

    /// Suggested delay before honoring a retryable error, used for
    /// Retry-After metadata.
    pub fn retry_after(err: &StandardError) -> Option<Duration> {
        err.retry_after_ms.map(Duration::from_millis)
    }
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}
