//! End-to-end pipeline tests with scripted in-process executors.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use service_gateway::config::schema::GatewayConfig;
use service_gateway::error::classify::RawError;
use service_gateway::error::handler::ErrorHandler;
use service_gateway::gateway::{Gateway, GatewayExecutor, GatewayRequest, HttpMethod};

type Script = Box<dyn Fn(u32) -> Result<Value, RawError> + Send + Sync>;

struct ScriptedExecutor {
    calls: AtomicU32,
    script: Script,
}

impl ScriptedExecutor {
    fn new(
        script: impl Fn(u32) -> Result<Value, RawError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            script: Box::new(script),
        })
    }

    fn always_ok() -> Arc<Self> {
        Self::new(|_| Ok(json!({ "ok": true })))
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GatewayExecutor for ScriptedExecutor {
    async fn execute(&self, _request: &GatewayRequest) -> Result<Value, RawError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.script)(call)
    }
}

fn fast_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config
}

fn gateway(config: GatewayConfig, executor: Arc<ScriptedExecutor>) -> Gateway {
    let errors = Arc::new(ErrorHandler::with_breaker_defaults(
        (&config.circuit_breaker).into(),
    ));
    Gateway::new(config, errors, executor)
}

fn post(endpoint: &str) -> GatewayRequest {
    GatewayRequest::new(HttpMethod::Post, endpoint).with_header("x-csrf-token", "tok-1")
}

#[tokio::test]
async fn injection_payload_is_rejected_before_execution() {
    let executor = ScriptedExecutor::always_ok();
    let gw = gateway(fast_config(), executor.clone());

    let response = gw
        .handle(post("/api/notes").with_data(json!({ "note": "<script>alert(1)</script>" })))
        .await;

    assert!(!response.success);
    assert_eq!(response.error.unwrap().code, "VALIDATION_ERROR");
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn mutating_request_without_csrf_token_is_rejected() {
    let executor = ScriptedExecutor::always_ok();
    let gw = gateway(fast_config(), executor.clone());

    let response = gw
        .handle(GatewayRequest::new(HttpMethod::Post, "/api/calls").with_data(json!({})))
        .await;

    assert!(!response.success);
    assert_eq!(response.error.unwrap().code, "AUTHENTICATION_ERROR");
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn whitelisted_endpoint_needs_no_token() {
    let executor = ScriptedExecutor::always_ok();
    let gw = gateway(fast_config(), executor.clone());

    let response = gw
        .handle(GatewayRequest::new(HttpMethod::Post, "/health/refresh"))
        .await;

    assert!(response.success);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn rate_limit_denial_carries_retry_after() {
    let mut config = fast_config();
    config.rate_limit.max_requests = 2;
    let gw = gateway(config, ScriptedExecutor::always_ok());

    for _ in 0..2 {
        let response = gw
            .handle(GatewayRequest::new(HttpMethod::Get, "/api/reports"))
            .await;
        assert!(response.success);
    }

    let denied = gw
        .handle(GatewayRequest::new(HttpMethod::Get, "/api/reports"))
        .await;
    assert!(!denied.success);
    assert_eq!(denied.error.unwrap().code, "RATE_LIMIT_ERROR");
    let rate_limit = denied.meta.rate_limit.expect("denial includes limit meta");
    assert!(rate_limit.retry_after_ms.is_some());
    assert_eq!(rate_limit.remaining, 0);
}

#[tokio::test]
async fn transient_failures_are_retried_to_success() {
    let executor = ScriptedExecutor::new(|call| {
        if call < 3 {
            Err(RawError::Network("connection reset".into()))
        } else {
            Ok(json!({ "ok": true }))
        }
    });
    let gw = gateway(fast_config(), executor.clone());

    let response = gw
        .handle(GatewayRequest::new(HttpMethod::Get, "/api/reports"))
        .await;

    assert!(response.success);
    assert_eq!(executor.calls(), 3);
    assert_eq!(response.meta.retry_attempt, Some(2));
}

#[tokio::test]
async fn retry_storm_opens_the_endpoint_circuit() {
    let mut config = fast_config();
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.minimum_throughput = 2;
    let executor = ScriptedExecutor::new(|_| Err(RawError::Network("down".into())));
    let gw = gateway(config, executor.clone());

    let mut request = GatewayRequest::new(HttpMethod::Get, "/api/flaky");
    request.retries = Some(10);
    let response = gw.handle(request).await;

    assert!(!response.success);
    // Two failed attempts trip the breaker; the third acquisition fails
    // fast without reaching the executor.
    assert_eq!(executor.calls(), 2);
    assert_eq!(response.error.unwrap().code, "EXTERNAL_SERVICE_ERROR");
}

#[tokio::test]
async fn open_circuit_rejects_subsequent_requests_outright() {
    let mut config = fast_config();
    config.circuit_breaker.failure_threshold = 2;
    config.circuit_breaker.minimum_throughput = 2;
    let executor = ScriptedExecutor::new(|_| Err(RawError::Network("down".into())));
    let gw = gateway(config, executor.clone());

    let mut request = GatewayRequest::new(HttpMethod::Get, "/api/flaky");
    request.retries = Some(10);
    gw.handle(request).await;
    let calls_after_first = executor.calls();

    let rejected = gw
        .handle(GatewayRequest::new(HttpMethod::Get, "/api/flaky"))
        .await;
    assert!(!rejected.success);
    assert_eq!(executor.calls(), calls_after_first);
}

#[tokio::test]
async fn responses_are_masked_and_normalized() {
    let executor = ScriptedExecutor::new(|_| {
        Ok(json!({
            "userName": "alice",
            "apiKey": "sk-secret",
            "createdAt": 1_700_000_000i64
        }))
    });
    let gw = gateway(fast_config(), executor);

    let response = gw
        .handle(GatewayRequest::new(HttpMethod::Get, "/api/users/1"))
        .await;

    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(data["user_name"], "alice");
    assert_eq!(data["api_key"], "***");
    assert!(data["created_at"].as_str().unwrap().starts_with("2023-11-14T"));
}

#[tokio::test]
async fn transform_can_be_disabled_per_request() {
    let executor = ScriptedExecutor::new(|_| Ok(json!({ "apiKey": "sk-secret" })));
    let gw = gateway(fast_config(), executor);

    let mut request = GatewayRequest::new(HttpMethod::Get, "/api/raw");
    request.transform = false;
    let response = gw.handle(request).await;

    assert_eq!(response.data.unwrap()["apiKey"], "sk-secret");
}
