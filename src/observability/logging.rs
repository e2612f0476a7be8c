//! Structured logging.
//!
//! Uses the tracing crate throughout; level configurable via config and
//! the `RUST_LOG` environment variable (environment wins).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Safe to call more than once (subsequent calls are no-ops), so tests
/// can initialize independently.
pub fn init(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("service_gateway={log_level}").into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
