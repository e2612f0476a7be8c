//! Health reporting types.
//!
//! The orchestrator aggregates per-service probe results and breaker
//! states into one [`HealthReport`]; callers poll it, nothing here runs
//! in the background.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Overall system health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every service reachable, every circuit closed.
    Healthy,
    /// At least one external backend is unreachable or circuit-broken;
    /// internal operations still work.
    Degraded,
    /// An internal dependency is down.
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Aggregated health snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Per-service probe results and breaker states.
    pub details: Value,
}
