//! Service orchestration subsystem.
//!
//! Registered backends are routed by kind: internal operations get the
//! retry policy, external operations get breaker protection with a
//! last-known-good cache behind them. Batches fan out over the same
//! `call` path with bounded concurrency.

pub mod batch;
pub mod cache;
pub mod context;
pub mod service;

pub use batch::{BatchOperation, BatchOptions};
pub use cache::FallbackCache;
pub use context::{OrchestrationContext, ResponseMetadata, ServiceResponse};
pub use service::ServiceOrchestrator;
