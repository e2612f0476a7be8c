//! Gateway request pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayRequest
//!     → validate.rs (structure, size limits, injection scan)
//!     → auth.rs (whitelist, CSRF gating)
//!     → rate limiter (client+endpoint key)
//!     → circuit breaker gate (endpoint key)
//!     → executor with retry/backoff
//!     → transform.rs (mask, normalize)
//!     → GatewayResponse envelope
//! ```

pub mod auth;
pub mod pipeline;
pub mod request;
pub mod transform;
pub mod validate;

pub use pipeline::{Gateway, GatewayExecutor};
pub use request::{
    ErrorBody, GatewayRequest, GatewayResponse, HttpMethod, RateLimitMeta, ResponseMeta,
};
