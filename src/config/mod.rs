//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require process restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An invalid config halts startup; it is never retried

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheSettings, CircuitBreakerSettings, GatewayConfig, ObservabilitySettings,
    RateLimitSettings, RetrySettings, SecuritySettings, ServiceConfig, ServiceKind,
    TimeoutSettings,
};
pub use validation::{validate_config, ValidationError};
