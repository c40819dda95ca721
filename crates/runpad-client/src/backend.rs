//! Where runs are sent.

use std::time::Duration;

use async_trait::async_trait;
use runpad_types::{ErrorBody, ExecuteRequest, ExecutionResult, StatusKind};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::offline::render_offline;

/// Executes a request and classifies the outcome.
///
/// `execute` never fails: transport problems and malformed responses are
/// folded into an [`ExecutionResult`] so they can be rendered like any other
/// outcome.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn health_check(&self) -> Result<()>;

    async fn execute(&self, request: &ExecuteRequest) -> ExecutionResult;
}

/// Sends runs to the execution relay over HTTP.
pub struct RelayBackend {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Relay backend for the configured URL, bounded by the request timeout.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.relay_url.clone()).with_timeout(config.request_timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn classify(status: u16, body: &str) -> ExecutionResult {
        let kind = StatusKind::from_http_status(status);

        if kind == StatusKind::Success {
            return match serde_json::from_str::<Value>(body) {
                Ok(value) => ExecutionResult::from_provider_body(&value),
                Err(_) => ExecutionResult::success(body),
            };
        }

        let error_body = serde_json::from_str::<ErrorBody>(body).unwrap_or_else(|_| {
            ErrorBody::new(format!("Relay responded with status {}", status)).with_detail(body)
        });

        match kind {
            StatusKind::UpstreamError => {
                let detail = match (error_body.upstream_status, error_body.detail) {
                    (Some(upstream), Some(detail)) => {
                        Some(format!("provider status {}: {}", upstream, detail))
                    }
                    (Some(upstream), None) => Some(format!("provider status {}", upstream)),
                    (None, detail) => detail,
                };
                ExecutionResult::upstream_error(error_body.error, detail)
            }
            StatusKind::ValidationError => ExecutionResult::validation_error(error_body.error),
            _ => ExecutionResult::internal_error(error_body.error),
        }
    }
}

#[async_trait]
impl ExecutionBackend for RelayBackend {
    fn name(&self) -> &str {
        "relay"
    }

    async fn health_check(&self) -> Result<()> {
        let health_url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&health_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ClientError::transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::transport(format!(
                "Health check failed: {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn execute(&self, request: &ExecuteRequest) -> ExecutionResult {
        let execute_url = format!("{}/api/execute", self.base_url);
        log::debug!(
            "Sending {} bytes of {} to {}",
            request.script.len(),
            request.language,
            execute_url
        );

        let response = match self
            .client
            .post(&execute_url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Execution relay unreachable: {}", e);
                return ExecutionResult::internal_error(format!(
                    "Could not reach the execution relay: {}",
                    e
                ));
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Self::classify(status, &body),
            Err(e) => {
                log::warn!("Failed to read relay response: {}", e);
                ExecutionResult::internal_error(format!(
                    "Could not read the execution relay response: {}",
                    e
                ))
            }
        }
    }
}

/// Approximates output locally without sending anything anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineBackend;

impl OfflineBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExecutionBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, request: &ExecuteRequest) -> ExecutionResult {
        render_offline(&request.script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn spawn_relay(status: StatusCode, body: Value) -> String {
        let app = Router::new()
            .route("/health", get(|| async { Json(json!({"status": "healthy"})) }))
            .route(
                "/api/execute",
                post(move || {
                    let body = body.clone();
                    async move { (status, Json(body)) }
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> ExecuteRequest {
        ExecuteRequest::new("print(42)", "python3")
    }

    #[tokio::test]
    async fn test_success_extracts_output() {
        let url = spawn_relay(StatusCode::OK, json!({"output": "42\n", "statusCode": 200})).await;
        let result = RelayBackend::new(url).execute(&request()).await;
        assert_eq!(result, ExecutionResult::success("42\n"));
    }

    #[tokio::test]
    async fn test_bad_gateway_is_upstream_error() {
        let url = spawn_relay(
            StatusCode::BAD_GATEWAY,
            json!({
                "error": "Execution provider returned an error",
                "detail": "{\"error\":\"Unauthorized Request\"}",
                "upstreamStatus": "401"
            }),
        )
        .await;
        let result = RelayBackend::new(url).execute(&request()).await;

        assert_eq!(result.status_kind, StatusKind::UpstreamError);
        assert_eq!(result.output, "Execution provider returned an error");
        let detail = result.detail.unwrap();
        assert!(detail.contains("401"));
        assert!(detail.contains("Unauthorized Request"));
    }

    #[tokio::test]
    async fn test_bad_request_is_validation_error() {
        let url = spawn_relay(
            StatusCode::BAD_REQUEST,
            json!({"error": "Invalid request: Missing required field: script"}),
        )
        .await;
        let result = RelayBackend::new(url).execute(&request()).await;
        assert_eq!(
            result,
            ExecutionResult::validation_error("Invalid request: Missing required field: script")
        );
    }

    #[tokio::test]
    async fn test_server_error_is_internal_error() {
        let url = spawn_relay(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Failed to execute code"}),
        )
        .await;
        let result = RelayBackend::new(url).execute(&request()).await;
        assert_eq!(result, ExecutionResult::internal_error("Failed to execute code"));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_internal_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = RelayBackend::new(format!("http://{}/", addr));
        let result = backend.execute(&request()).await;
        assert_eq!(result.status_kind, StatusKind::InternalError);
        assert!(result.output.starts_with("Could not reach the execution relay"));
        assert!(backend.health_check().await.is_err());
    }

    #[tokio::test]
    async fn test_health_check() {
        let url = spawn_relay(StatusCode::OK, json!({})).await;
        assert!(RelayBackend::new(url).health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_from_config_uses_relay_url() {
        let url = spawn_relay(StatusCode::OK, json!({"output": "from config"})).await;
        let config = ClientConfig::new()
            .with_relay_url(format!("{}/", url))
            .with_request_timeout(Duration::from_secs(3));
        let backend = RelayBackend::from_config(&config);

        assert_eq!(backend.base_url(), url);
        assert_eq!(backend.timeout, Duration::from_secs(3));
        assert_eq!(
            backend.execute(&request()).await,
            ExecutionResult::success("from config")
        );
    }

    #[tokio::test]
    async fn test_offline_backend_is_simulated() {
        let result = OfflineBackend::new()
            .execute(&ExecuteRequest::new("print(\"hi\")", "python3"))
            .await;
        assert!(result.simulated);
        assert_eq!(result.output, "hi");
    }
}
