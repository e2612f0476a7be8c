//! The gateway request pipeline.
//!
//! # Responsibilities
//! - Sequence the per-request stages: validate → authenticate → rate limit
//!   → circuit breaker gate → retrying execute → transform → record
//! - Convert every stage rejection into a structured failure envelope;
//!   nothing throws past `handle`
//!
//! # Design Decisions
//! - Each attempt records success/failure on the endpoint's breaker, so a
//!   retry storm against a sick endpoint opens its circuit mid-loop
//! - Only network/timeout/5xx-classified failures are retried
//! - Success logs are sampled; failures always log

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::schema::GatewayConfig;
use crate::error::classify::{ErrorContext, RawError};
use crate::error::handler::ErrorHandler;
use crate::error::taxonomy::{epoch_ms, ErrorCategory, RetryConfig, StandardError};
use crate::gateway::auth::authenticate;
use crate::gateway::request::{
    ErrorBody, GatewayRequest, GatewayResponse, RateLimitMeta, ResponseMeta,
};
use crate::gateway::transform::transform_payload;
use crate::gateway::validate::validate_request;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::rate_limit::RateLimiter;

/// The downstream call the pipeline protects. Implemented by HTTP
/// backends in production and by in-process fakes in tests.
#[async_trait]
pub trait GatewayExecutor: Send + Sync {
    async fn execute(&self, request: &GatewayRequest) -> Result<Value, RawError>;
}

/// The resilient front door for one process: composes validation, auth,
/// rate limiting, circuit breaking, and retrying execution into a single
/// request/response contract.
pub struct Gateway {
    config: GatewayConfig,
    retry: RetryConfig,
    limiter: Arc<RateLimiter>,
    errors: Arc<ErrorHandler>,
    executor: Arc<dyn GatewayExecutor>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        errors: Arc<ErrorHandler>,
        executor: Arc<dyn GatewayExecutor>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new((&config.rate_limit).into()));
        let retry = (&config.retry).into();
        Self {
            config,
            retry,
            limiter,
            errors,
            executor,
        }
    }

    /// The rate limiter, exposed so callers can wire up the sweeper.
    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    /// Run one request through the pipeline. Never panics, never returns
    /// a raw error: the answer is always an envelope.
    pub async fn handle(&self, request: GatewayRequest) -> GatewayResponse {
        let start = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let endpoint = request.endpoint.clone();
        let ctx = ErrorContext::new(format!("gateway:{endpoint}"), request_id.clone());

        tracing::debug!(
            request_id = %request_id,
            method = request.method.as_str(),
            endpoint = %endpoint,
            "Handling gateway request"
        );

        // 1. Validate
        if let Err(reason) = validate_request(&request, &self.config.security) {
            let err = StandardError::from_category(
                ErrorCategory::ValidationError,
                reason,
                &ctx.source,
                &request_id,
            );
            return self.failure(err, request_id, endpoint, start, None, None);
        }

        // 2. Authenticate
        if let Err(reason) = authenticate(&request, &self.config.security) {
            let err = StandardError::from_category(
                ErrorCategory::AuthenticationError,
                reason,
                &ctx.source,
                &request_id,
            );
            return self.failure(err, request_id, endpoint, start, None, None);
        }

        // 3. Rate limit
        let mut rate_limit_meta = None;
        if self.config.rate_limit.enabled && !request.skip_rate_limit {
            let client = request.client_identifier().to_string();
            let admitted = self.limiter.is_allowed(&client, &endpoint);
            let status = self.limiter.status(&client, &endpoint);
            let meta = RateLimitMeta {
                limit: status.limit,
                remaining: status.limit.saturating_sub(status.count),
                reset_after_ms: status.reset_after_ms,
                retry_after_ms: (!admitted).then_some(status.reset_after_ms),
            };
            if !admitted {
                let err = StandardError::from_category(
                    ErrorCategory::RateLimitError,
                    format!("rate limit exceeded for client '{client}'"),
                    &ctx.source,
                    &request_id,
                )
                .with_retry_after(status.reset_after_ms);
                return self.failure(err, request_id, endpoint, start, Some(meta), None);
            }
            rate_limit_meta = Some(meta);
        }

        // 4. Circuit breaker gate
        let breaker = self.errors.breaker(&format!("endpoint:{endpoint}"));
        if let Err(open) = breaker.try_acquire() {
            let err = self.errors.standardize(RawError::CircuitOpen(open), &ctx);
            metrics::record_breaker_state(breaker.key(), breaker.state());
            return self.failure(err, request_id, endpoint, start, rate_limit_meta, None);
        }

        // 5. Execute with retry, recording each attempt on the breaker
        let max_attempts = request.retries.unwrap_or(self.retry.max_attempts).max(1);
        let timeout = request
            .timeout
            .unwrap_or(Duration::from_secs(self.config.timeouts.request_secs));

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;

            // The breaker may have opened from a previous attempt (or a
            // concurrent request); honor it before calling out again.
            if let Err(open) = breaker.try_acquire() {
                break Err(self.errors.standardize(RawError::CircuitOpen(open), &ctx));
            }

            let result = match tokio::time::timeout(timeout, self.executor.execute(&request)).await
            {
                Ok(result) => result,
                Err(_) => Err(RawError::Timeout(format!(
                    "request to {endpoint} exceeded {}ms",
                    timeout.as_millis()
                ))),
            };

            match result {
                Ok(value) => {
                    breaker.record_success();
                    break Ok(value);
                }
                Err(raw) => {
                    breaker.record_failure(&raw.to_string());
                    let err = self.errors.standardize(raw, &ctx);
                    let give_up = !err.retryable
                        || !self.retry.retryable_categories.contains(&err.category)
                        || attempt >= max_attempts;
                    if give_up {
                        break Err(err);
                    }
                    let delay = calculate_backoff(
                        attempt,
                        self.retry.base_delay_ms,
                        self.retry.max_delay_ms,
                        self.retry.backoff_factor,
                    );
                    tracing::info!(
                        request_id = %request_id,
                        endpoint = %endpoint,
                        attempt,
                        delay = ?delay,
                        "Retrying request"
                    );
                    metrics::record_retry(&ctx.source);
                    tokio::time::sleep(delay).await;
                }
            }
        };
        let retry_attempt = (attempt > 1).then_some(attempt - 1);

        match outcome {
            Ok(data) => {
                // 6. Transform
                let data = if request.transform {
                    transform_payload(data)
                } else {
                    data
                };

                // 7. Record
                metrics::record_request(&endpoint, "success", start);
                if fastrand::f64() < self.config.observability.log_sample_rate {
                    tracing::info!(
                        request_id = %request_id,
                        endpoint = %endpoint,
                        duration_ms = start.elapsed().as_millis() as u64,
                        attempts = attempt,
                        "Request completed"
                    );
                }

                GatewayResponse {
                    success: true,
                    data: Some(data),
                    error: None,
                    meta: ResponseMeta {
                        request_id,
                        timestamp_ms: epoch_ms(),
                        duration_ms: start.elapsed().as_millis() as u64,
                        endpoint,
                        cached: None,
                        retry_attempt,
                        rate_limit: rate_limit_meta,
                    },
                }
            }
            Err(err) => self.failure(err, request_id, endpoint, start, rate_limit_meta, retry_attempt),
        }
    }

    fn failure(
        &self,
        err: StandardError,
        request_id: String,
        endpoint: String,
        start: Instant,
        rate_limit: Option<RateLimitMeta>,
        retry_attempt: Option<u32>,
    ) -> GatewayResponse {
        metrics::record_request(&endpoint, &err.code, start);
        tracing::warn!(
            request_id = %request_id,
            endpoint = %endpoint,
            code = %err.code,
            "Request failed: {}",
            err.message
        );

        // The internal message surfaces only in debug builds, and then only
        // under the diagnostics field.
        let stack = if cfg!(debug_assertions) {
            Some(err.message.clone())
        } else {
            None
        };

        GatewayResponse {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: err.code,
                message: err.user_message,
                details: err.details,
                stack,
            }),
            meta: ResponseMeta {
                request_id,
                timestamp_ms: epoch_ms(),
                duration_ms: start.elapsed().as_millis() as u64,
                endpoint,
                cached: None,
                retry_attempt,
                rate_limit,
            },
        }
    }
}
