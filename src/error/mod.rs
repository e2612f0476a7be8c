//! Error taxonomy, classification, and the ErrorHandler.
//!
//! Single vocabulary rule: every failure (validation, auth, rate limit,
//! circuit breaker, backend call, cache miss) becomes a [`StandardError`]
//! before it is ever shown to a caller.

pub mod classify;
pub mod handler;
pub mod taxonomy;

pub use classify::{ErrorContext, RawError};
pub use handler::{AlertSink, ErrorHandler};
pub use taxonomy::{ErrorCategory, ErrorSeverity, RetryConfig, StandardError};
