//! Batch execution types: bounded-concurrency options and operation
//! descriptors.
//!
//! The execution itself lives on the orchestrator; this module holds the
//! contract so call sites and tests share one vocabulary.

use serde_json::Value;
use std::time::Duration;

use crate::orchestrator::context::OrchestrationContext;

/// One operation inside a batch.
#[derive(Debug, Clone)]
pub struct BatchOperation {
    pub service: String,
    pub operation: String,
    pub params: Value,
    /// Optional explicit context; absent means the batch context is
    /// cloned with a fresh correlation id per item.
    pub context: Option<OrchestrationContext>,
}

impl BatchOperation {
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            service: service.into(),
            operation: operation.into(),
            params,
            context: None,
        }
    }

    pub fn with_context(mut self, context: OrchestrationContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Batch execution policy.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Upper bound on operations in flight at once. Operations run in
    /// chunks of this size; a chunk is fully joined before the next starts.
    pub max_concurrency: usize,
    /// Abort the whole batch on the first failure.
    pub fail_fast: bool,
    /// Per-item deadline.
    pub timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            fail_fast: false,
            timeout: Duration::from_secs(30),
        }
    }
}
