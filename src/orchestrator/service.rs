//! ServiceOrchestrator: routes operations to registered backends with the
//! resilience policy their kind demands.
//!
//! # Responsibilities
//! - Internal services: retry with backoff, no breaker, no cache
//! - External services: circuit breaker with last-known-good cache fallback
//! - Bounded-concurrency batch execution with per-item deadlines
//! - Aggregate health over registered services and breakers
//!
//! # Design Decisions
//! - Breakers are keyed `service:{name}` so one flaky backend never
//!   affects another
//! - Successful external responses are written through to the fallback
//!   cache before being returned

use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use crate::backend::ServiceBackend;
use crate::config::schema::ServiceKind;
use crate::error::classify::{ErrorContext, RawError};
use crate::error::handler::ErrorHandler;
use crate::error::taxonomy::{ErrorCategory, RetryConfig, StandardError};
use crate::health::{HealthReport, HealthStatus};
use crate::observability::metrics;
use crate::orchestrator::batch::{BatchOperation, BatchOptions};
use crate::orchestrator::cache::FallbackCache;
use crate::orchestrator::context::{OrchestrationContext, ResponseMetadata, ServiceResponse};
use crate::resilience::circuit_breaker::CircuitState;

struct ServiceRegistration {
    backend: Arc<dyn ServiceBackend>,
    kind: ServiceKind,
}

/// Front door for every backend operation. One instance is shared across
/// the process; registrations happen at startup.
pub struct ServiceOrchestrator {
    services: DashMap<String, ServiceRegistration>,
    errors: Arc<ErrorHandler>,
    cache: Arc<FallbackCache>,
    retry: RetryConfig,
}

impl ServiceOrchestrator {
    pub fn new(errors: Arc<ErrorHandler>, cache: Arc<FallbackCache>, retry: RetryConfig) -> Self {
        Self {
            services: DashMap::new(),
            errors,
            cache,
            retry,
        }
    }

    /// Register a backend under a unique name. Re-registering replaces the
    /// previous backend, which tests use to swap in fakes.
    pub fn register(
        &self,
        name: impl Into<String>,
        kind: ServiceKind,
        backend: Arc<dyn ServiceBackend>,
    ) {
        let name = name.into();
        tracing::info!(service = %name, kind = ?kind, "Registered service backend");
        self.services
            .insert(name, ServiceRegistration { backend, kind });
    }

    pub fn cache(&self) -> &Arc<FallbackCache> {
        &self.cache
    }

    /// Execute one operation with the policy matching the service's kind.
    pub async fn call(
        &self,
        service: &str,
        operation: &str,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> ServiceResponse<Value> {
        let start = Instant::now();
        let ectx = ErrorContext::new(service, &ctx.correlation_id);

        let (kind, backend) = match self.services.get(service) {
            Some(reg) => (reg.kind, reg.backend.clone()),
            None => {
                let err = self.errors.standardize(
                    RawError::Standard(StandardError::from_category(
                        ErrorCategory::ClientError,
                        format!("unknown service '{service}'"),
                        service,
                        &ctx.correlation_id,
                    )),
                    &ectx,
                );
                return ServiceResponse::err(err, self.metadata(service, ctx, start, None, None));
            }
        };

        match kind {
            ServiceKind::Internal => {
                self.call_internal(service, operation, params, ctx, &ectx, backend, start)
                    .await
            }
            ServiceKind::External => {
                self.call_external(service, operation, params, ctx, &ectx, backend, start)
                    .await
            }
        }
    }

    /// Internal operations are retried but never circuit-broken or served
    /// from cache: stale persistence reads are worse than visible errors.
    async fn call_internal(
        &self,
        service: &str,
        operation: &str,
        params: Value,
        ctx: &OrchestrationContext,
        ectx: &ErrorContext,
        backend: Arc<dyn ServiceBackend>,
        start: Instant,
    ) -> ServiceResponse<Value> {
        let attempts = AtomicU32::new(0);
        let result = self
            .errors
            .execute_with_retry(ectx, &self.retry, |attempt| {
                attempts.store(attempt, Ordering::SeqCst);
                let backend = backend.clone();
                let params = params.clone();
                async move { backend.call(operation, params, ctx).await }
            })
            .await;

        let attempt = attempts.load(Ordering::SeqCst);
        let retry_attempt = (attempt > 1).then_some(attempt);
        let metadata = self.metadata(service, ctx, start, None, retry_attempt);
        match result {
            Ok(value) => ServiceResponse::ok(value, metadata),
            Err(err) => ServiceResponse::err(err, metadata),
        }
    }

    /// External operations run under the per-service breaker; when the
    /// circuit refuses the call (or this call opens it), a fresh cache
    /// entry is served instead.
    async fn call_external(
        &self,
        service: &str,
        operation: &str,
        params: Value,
        ctx: &OrchestrationContext,
        ectx: &ErrorContext,
        backend: Arc<dyn ServiceBackend>,
        start: Instant,
    ) -> ServiceResponse<Value> {
        let breaker_key = format!("service:{service}");
        let cache_key = format!("{service}:{operation}:{}", ctx.cache_key_part());

        let result = self
            .errors
            .execute_with_breaker_fallback(
                &breaker_key,
                ectx,
                || {
                    let backend = backend.clone();
                    async move {
                        let value = backend.call(operation, params, ctx).await?;
                        Ok((value, false))
                    }
                },
                || async {
                    match self.cache.get(&cache_key) {
                        Some(value) => {
                            tracing::info!(
                                service,
                                operation,
                                correlation_id = %ctx.correlation_id,
                                "Serving cached fallback while circuit is open"
                            );
                            Ok((value, true))
                        }
                        None => Err(RawError::Standard(StandardError::from_category(
                            ErrorCategory::ExternalServiceError,
                            "service unavailable, no cached data",
                            service,
                            &ctx.correlation_id,
                        ))),
                    }
                },
            )
            .await;

        match result {
            Ok((value, cached)) => {
                if !cached {
                    self.cache.put(cache_key, value.clone());
                }
                let metadata = self.metadata(service, ctx, start, Some(cached), None);
                ServiceResponse::ok(value, metadata)
            }
            Err(err) => {
                let metadata = self.metadata(service, ctx, start, None, None);
                ServiceResponse::err(err, metadata)
            }
        }
    }

    fn metadata(
        &self,
        service: &str,
        ctx: &OrchestrationContext,
        start: Instant,
        cached: Option<bool>,
        retry_attempt: Option<u32>,
    ) -> ResponseMetadata {
        ResponseMetadata {
            correlation_id: ctx.correlation_id.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
            service: service.to_string(),
            cached,
            retry_attempt,
        }
    }

    /// Start an outbound voice call through the telephony backend.
    pub async fn start_voice_call(
        &self,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> ServiceResponse<Value> {
        self.call("voice", "start_call", params, ctx).await
    }

    /// Send an SMS through the messaging backend.
    pub async fn send_sms(
        &self,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> ServiceResponse<Value> {
        self.call("sms", "send_sms", params, ctx).await
    }

    /// Resolve an address through the maps backend. Heavily cached: the
    /// same address geocodes to the same point.
    pub async fn geocode_address(
        &self,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> ServiceResponse<Value> {
        self.call("maps", "geocode", params, ctx).await
    }

    /// Kick off a workflow run in the automation backend.
    pub async fn trigger_workflow(
        &self,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> ServiceResponse<Value> {
        self.call("workflows", "trigger", params, ctx).await
    }

    /// Run a batch of operations with bounded concurrency.
    ///
    /// Operations run in chunks of `max_concurrency`; a chunk is fully
    /// joined before the next starts, so at most `max_concurrency` items
    /// are ever in flight. Results come back in input order. With
    /// `fail_fast`, the first failed item aborts everything still running
    /// and the batch returns that item's error.
    pub async fn execute_batch(
        self: &Arc<Self>,
        ctx: &OrchestrationContext,
        operations: Vec<BatchOperation>,
        options: BatchOptions,
    ) -> Result<Vec<ServiceResponse<Value>>, StandardError> {
        let chunk_size = options.max_concurrency.max(1);
        let total = operations.len();
        let mut results: Vec<Option<ServiceResponse<Value>>> =
            (0..total).map(|_| None).collect();

        tracing::debug!(
            total,
            chunk_size,
            fail_fast = options.fail_fast,
            correlation_id = %ctx.correlation_id,
            "Starting batch execution"
        );

        let mut offset = 0;
        for chunk in operations.chunks(chunk_size) {
            let mut set = JoinSet::new();
            for (i, op) in chunk.iter().enumerate() {
                let index = offset + i;
                let op = op.clone();
                let item_ctx = op.context.clone().unwrap_or_else(|| {
                    let mut item = ctx.clone();
                    item.correlation_id = uuid::Uuid::new_v4().to_string();
                    item.operation = op.operation.clone();
                    item
                });
                let orchestrator = Arc::clone(self);
                let timeout = options.timeout;
                set.spawn(async move {
                    let outcome = tokio::time::timeout(
                        timeout,
                        orchestrator.call(&op.service, &op.operation, op.params.clone(), &item_ctx),
                    )
                    .await;
                    let response = match outcome {
                        Ok(response) => response,
                        Err(_) => {
                            let err = orchestrator.errors.standardize(
                                RawError::Timeout(format!(
                                    "batch item '{}:{}' exceeded {:?}",
                                    op.service, op.operation, timeout
                                )),
                                &ErrorContext::new(&op.service, &item_ctx.correlation_id),
                            );
                            ServiceResponse::err(
                                err,
                                ResponseMetadata {
                                    correlation_id: item_ctx.correlation_id.clone(),
                                    duration_ms: timeout.as_millis() as u64,
                                    service: op.service.clone(),
                                    cached: None,
                                    retry_attempt: None,
                                },
                            )
                        }
                    };
                    (index, response)
                });
            }

            while let Some(joined) = set.join_next().await {
                let (index, response) = match joined {
                    Ok(pair) => pair,
                    // Aborted or panicked task; fail_fast is already
                    // returning, and a panic propagates.
                    Err(e) if e.is_cancelled() => continue,
                    Err(e) => std::panic::resume_unwind(e.into_panic()),
                };
                metrics::record_batch_item(if response.success { "success" } else { "failure" });
                if options.fail_fast && !response.success {
                    set.abort_all();
                    let err = response
                        .error
                        .clone()
                        .expect("failed response carries an error");
                    tracing::warn!(
                        index,
                        code = %err.code,
                        correlation_id = %ctx.correlation_id,
                        "Batch aborted on first failure"
                    );
                    return Err(err);
                }
                results[index] = Some(response);
            }
            offset += chunk.len();
        }

        Ok(results
            .into_iter()
            .map(|slot| slot.expect("every batch slot is filled"))
            .collect())
    }

    /// Probe every registered service and fold in breaker states.
    ///
    /// An unreachable internal service makes the whole report unhealthy; an
    /// unreachable or circuit-broken external service only degrades it.
    pub async fn health_check(&self) -> HealthReport {
        let mut status = HealthStatus::Healthy;
        let mut services = serde_json::Map::new();

        let registrations: Vec<(String, ServiceKind, Arc<dyn ServiceBackend>)> = self
            .services
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().kind,
                    entry.value().backend.clone(),
                )
            })
            .collect();

        for (name, kind, backend) in registrations {
            let reachable = backend.probe().await;
            if !reachable {
                status = match kind {
                    ServiceKind::Internal => HealthStatus::Unhealthy,
                    ServiceKind::External if status != HealthStatus::Unhealthy => {
                        HealthStatus::Degraded
                    }
                    _ => status,
                };
            }
            services.insert(
                name,
                json!({ "kind": kind, "reachable": reachable }),
            );
        }

        let mut breakers = serde_json::Map::new();
        for (key, snapshot) in self.errors.breaker_states() {
            if snapshot.state != CircuitState::Closed && status == HealthStatus::Healthy {
                status = HealthStatus::Degraded;
            }
            breakers.insert(key, json!(snapshot));
        }

        HealthReport {
            status,
            details: json!({
                "services": Value::Object(services),
                "breakers": Value::Object(breakers),
                "cache_entries": self.cache.len(),
            }),
        }
    }
}
