//! Backend service clients.
//!
//! [`ServiceBackend`] is the seam between the resilience layer and the
//! outside world: production code wires [`HttpBackend`]s, tests wire
//! in-process fakes.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::config::schema::ServiceConfig;
use crate::error::classify::RawError;
use crate::gateway::pipeline::GatewayExecutor;
use crate::gateway::request::{GatewayRequest, HttpMethod};
use crate::orchestrator::context::OrchestrationContext;

/// One callable backend service.
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// Perform `operation` with the given parameters.
    async fn call(
        &self,
        operation: &str,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> Result<Value, RawError>;

    /// Cheap reachability check for the health surface.
    async fn probe(&self) -> bool {
        true
    }
}

/// HTTP-backed service client.
pub struct HttpBackend {
    name: String,
    base_url: String,
    health_path: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &ServiceConfig) -> Result<Self, RawError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RawError::Opaque(format!("failed to build http client: {e}")))?;
        Ok(Self {
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            health_path: config.health_path.clone(),
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn post_json(
        &self,
        url: String,
        body: Value,
        correlation_id: &str,
    ) -> Result<Value, RawError> {
        let response = self
            .client
            .post(&url)
            .header("x-correlation-id", correlation_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response.json::<Value>().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RawError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ServiceBackend for HttpBackend {
    async fn call(
        &self,
        operation: &str,
        params: Value,
        ctx: &OrchestrationContext,
    ) -> Result<Value, RawError> {
        let url = format!("{}/{}", self.base_url, operation.trim_start_matches('/'));
        tracing::debug!(
            service = %self.name,
            operation,
            correlation_id = %ctx.correlation_id,
            "Calling backend"
        );
        self.post_json(url, params, &ctx.correlation_id).await
    }

    async fn probe(&self) -> bool {
        let url = format!("{}{}", self.base_url, self.health_path);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(service = %self.name, error = %e, "Health probe failed");
                false
            }
        }
    }
}

/// The pipeline can drive an HTTP backend directly: the request endpoint
/// becomes the path, the body travels as JSON.
#[async_trait]
impl GatewayExecutor for HttpBackend {
    async fn execute(&self, request: &GatewayRequest) -> Result<Value, RawError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self.client.request(method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(data) = &request.data {
            builder = builder.json(data);
        }

        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<Value>().await?)
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(RawError::Http {
                status: status.as_u16(),
                message,
            })
        }
    }
}
