//! Lifecycle management.
//!
//! Background tasks (rate-limit sweep, cache sweep) subscribe to one
//! broadcast shutdown signal so tests can start and stop them
//! deterministically.

pub mod shutdown;

pub use shutdown::Shutdown;
