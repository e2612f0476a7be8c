//! Resilience subsystem: the leaf components the gateway composes.
//!
//! # Data Flow
//! ```text
//! Request admission:
//!     → rate_limit.rs (token bucket + fixed window, per client+endpoint)
//!     → circuit_breaker.rs (per-key failure/recovery state machine)
//! Failed call:
//!     → backoff.rs (exponential delay with jitter between retry attempts)
//! ```
//!
//! # Design Decisions
//! - Limiter and breakers never sleep; denial is a value, not a wait
//! - Circuit breaker prevents cascading failures into sick backends
//! - Backoff jitter prevents synchronized retry storms

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;

pub use backoff::calculate_backoff;
pub use circuit_breaker::{
    BreakerMetrics, CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, CircuitState,
};
pub use rate_limit::{RateLimitStatus, RateLimiter, RateLimiterConfig};
