//! Resilient service gateway library.
//!
//! Front-door plumbing for calling unreliable backends: a validated
//! request pipeline with rate limiting and circuit breaking, a uniform
//! error taxonomy, and an orchestrator that routes operations by service
//! kind (retry-only internal, breaker-plus-cache external).
//!
//! The building blocks compose bottom-up:
//! - [`resilience`]: rate limiter, circuit breaker, backoff
//! - [`error`]: taxonomy, classification, retry/breaker policy
//! - [`gateway`]: the staged request pipeline
//! - [`orchestrator`]: service routing, fallback cache, batch execution
//! - [`backend`]: the trait backends implement, plus the HTTP client

pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod resilience;

pub use backend::{HttpBackend, ServiceBackend};
pub use config::schema::GatewayConfig;
pub use error::handler::ErrorHandler;
pub use error::taxonomy::StandardError;
pub use gateway::{Gateway, GatewayRequest, GatewayResponse};
pub use lifecycle::Shutdown;
pub use orchestrator::{OrchestrationContext, ServiceOrchestrator, ServiceResponse};
