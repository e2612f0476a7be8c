//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold within monitoring period
//!                (and total throughput >= minimum_throughput)
//! Open → Half-Open: after recovery timeout
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-key circuit breaker (not global); registry lives in ErrorHandler
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering backend)
//! - Failure and success history are both pruned to the monitoring period
//!   so minimum_throughput and failure_rate compare windowed counts

use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker tuning parameters.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Windowed failures required to open the circuit.
    pub failure_threshold: usize,
    /// How long the circuit stays open before allowing a probe.
    pub recovery_timeout: Duration,
    /// Sliding window over which failures and successes are counted.
    pub monitoring_period: Duration,
    /// Minimum windowed throughput before the threshold can trip.
    /// Prevents opening on the first few requests after a quiet period.
    pub minimum_throughput: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            monitoring_period: Duration::from_secs(10),
            minimum_throughput: 10,
        }
    }
}

/// Observable breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// The distinguished error returned when a call is refused because the
/// circuit is open. Callers never reach the protected function.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit '{key}' is open, retry in {retry_after_ms}ms")]
pub struct CircuitOpenError {
    pub key: String,
    pub retry_after_ms: u64,
}

/// Point-in-time breaker metrics.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerMetrics {
    pub state: CircuitState,
    pub failure_count: usize,
    pub success_count: usize,
    pub failure_rate: f64,
}

struct Inner {
    state: CircuitState,
    /// Failure history within the monitoring period, with reasons.
    failures: Vec<(Instant, String)>,
    /// Success history within the monitoring period.
    successes: Vec<Instant>,
    /// When an open circuit next allows a probe.
    next_attempt: Option<Instant>,
}

/// Failure/recovery state machine for one protected key.
///
/// Shared across tasks via `Arc`; the inner mutex is held only for short
/// synchronous sections, never across an await.
pub struct CircuitBreaker {
    key: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            key: key.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: Vec::new(),
                successes: Vec::new(),
                next_attempt: None,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record a failed call against this breaker.
    pub fn record_failure(&self, reason: &str) {
        let now = Instant::now();
        let mut inner = self.lock();
        inner.failures.push((now, reason.to_string()));
        self.prune(&mut inner, now);

        match inner.state {
            CircuitState::HalfOpen => {
                // Probe failed: reopen immediately with a renewed cooldown.
                inner.state = CircuitState::Open;
                inner.next_attempt = Some(now + self.config.recovery_timeout);
                tracing::warn!(key = %self.key, reason, "Circuit breaker reopening after failed probe");
            }
            CircuitState::Closed => {
                let throughput = inner.failures.len() + inner.successes.len();
                if inner.failures.len() >= self.config.failure_threshold
                    && throughput >= self.config.minimum_throughput
                {
                    inner.state = CircuitState::Open;
                    inner.next_attempt = Some(now + self.config.recovery_timeout);
                    tracing::warn!(
                        key = %self.key,
                        failures = inner.failures.len(),
                        throughput,
                        "Circuit breaker opening"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a successful call against this breaker.
    pub fn record_success(&self) {
        let now = Instant::now();
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                // Single-probe recovery: one success closes the circuit.
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.successes.clear();
                inner.next_attempt = None;
                tracing::info!(key = %self.key, "Circuit breaker closed after successful probe");
            }
            _ => {
                inner.successes.push(now);
                self.prune(&mut inner, now);
            }
        }
    }

    /// Current state, lazily transitioning Open → Half-Open once the
    /// recovery timeout has elapsed. The transition only exposes the new
    /// state; admission happens on the next `try_acquire`/`execute`.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh_state(&mut inner);
        inner.state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Check whether a call may proceed right now.
    ///
    /// Returns the distinguished open error (with a retry hint) when the
    /// circuit refuses the call.
    pub fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.lock();
        self.refresh_state(&mut inner);
        match inner.state {
            CircuitState::Open => {
                let retry_after_ms = inner
                    .next_attempt
                    .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as u64)
                    .unwrap_or_default();
                Err(CircuitOpenError {
                    key: self.key.clone(),
                    retry_after_ms,
                })
            }
            _ => Ok(()),
        }
    }

    /// Run `op` under this breaker: fail fast when open, otherwise record
    /// the outcome and propagate the original error on failure.
    pub async fn execute<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        E: From<CircuitOpenError> + std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        self.try_acquire().map_err(E::from)?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err.to_string());
                Err(err)
            }
        }
    }

    /// Like [`execute`](Self::execute), but when the circuit is open
    /// (before the call or as a result of it) invoke `fallback` instead of
    /// propagating the error.
    pub async fn execute_with_fallback<T, E, F, Fut, FB, FbFut>(
        &self,
        op: F,
        fallback: FB,
    ) -> Result<T, E>
    where
        E: From<CircuitOpenError> + std::fmt::Display,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        FB: FnOnce() -> FbFut,
        FbFut: std::future::Future<Output = Result<T, E>>,
    {
        if self.try_acquire().is_err() {
            return fallback().await;
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure(&err.to_string());
                if self.state() == CircuitState::Open {
                    fallback().await
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Windowed metrics snapshot.
    pub fn metrics(&self) -> BreakerMetrics {
        let mut inner = self.lock();
        let now = Instant::now();
        self.prune(&mut inner, now);
        self.refresh_state(&mut inner);
        let failures = inner.failures.len();
        let successes = inner.successes.len();
        let total = failures + successes;
        BreakerMetrics {
            state: inner.state,
            failure_count: failures,
            success_count: successes,
            failure_rate: if total == 0 { 0.0 } else { failures as f64 / total as f64 },
        }
    }

    /// Administrative hard reset to Closed with empty history.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.successes.clear();
        inner.next_attempt = None;
        tracing::info!(key = %self.key, "Circuit breaker reset");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn refresh_state(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(at) = inner.next_attempt {
                if Instant::now() >= at {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(key = %self.key, "Circuit breaker half-open, next call is the probe");
                }
            }
        }
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let window = self.config.monitoring_period;
        inner
            .failures
            .retain(|(at, _)| now.saturating_duration_since(*at) <= window);
        inner
            .successes
            .retain(|at| now.saturating_duration_since(*at) <= window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_millis(100),
            monitoring_period: Duration::from_secs(1),
            minimum_throughput: 2,
        }
    }

    #[test]
    fn opens_after_threshold_failures() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_failure("boom");
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure("boom");
        assert!(cb.is_open());
    }

    #[test]
    fn minimum_throughput_gates_opening() {
        let mut config = test_config();
        config.minimum_throughput = 5;
        let cb = CircuitBreaker::new("svc", config);
        cb.record_failure("boom");
        cb.record_failure("boom");
        // Two failures meet the threshold but not the throughput floor.
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_success();
        cb.record_success();
        cb.record_failure("boom");
        assert!(cb.is_open());
    }

    #[tokio::test]
    async fn open_circuit_never_invokes_function() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_failure("boom");
        cb.record_failure("boom");

        let mut invoked = false;
        let result: Result<(), CircuitOpenError> = cb
            .execute(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;
        assert!(result.is_err());
        assert!(!invoked);
    }

    #[tokio::test]
    async fn probe_success_closes_and_clears_history() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_failure("boom");
        cb.record_failure("boom");
        assert!(cb.is_open());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let result: Result<u32, CircuitOpenError> = cb.execute(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(cb.state(), CircuitState::Closed);
        let metrics = cb.metrics();
        assert_eq!(metrics.failure_count, 0);
        assert_eq!(metrics.success_count, 0);
    }

    #[tokio::test]
    async fn probe_failure_reopens_with_renewed_cooldown() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_failure("boom");
        cb.record_failure("boom");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let result: Result<(), CircuitOpenError> = cb
            .execute(|| async {
                Err(CircuitOpenError { key: "probe failed".into(), retry_after_ms: 0 })
            })
            .await;
        assert!(result.is_err());
        assert!(cb.is_open());
        // Cooldown was renewed, so the very next acquire still fails.
        assert!(cb.try_acquire().is_err());
    }

    #[tokio::test]
    async fn fallback_used_when_open() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_failure("boom");
        cb.record_failure("boom");

        let result: Result<&str, CircuitOpenError> = cb
            .execute_with_fallback(|| async { Ok("live") }, || async { Ok("cached") })
            .await;
        assert_eq!(result.unwrap(), "cached");
    }

    #[test]
    fn failure_rate_reflects_windowed_counts() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_success();
        cb.record_success();
        cb.record_success();
        cb.record_failure("boom");
        let metrics = cb.metrics();
        assert_eq!(metrics.success_count, 3);
        assert_eq!(metrics.failure_count, 1);
        assert!((metrics.failure_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn reset_returns_to_closed() {
        let cb = CircuitBreaker::new("svc", test_config());
        cb.record_failure("boom");
        cb.record_failure("boom");
        assert!(cb.is_open());
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }
}
