//! Upstream execution provider access.
//!
//! The relay never lets a client choose which credentials are sent: the
//! provider owns them and attaches them to every outgoing payload itself.

use async_trait::async_trait;
use runpad_types::ExecuteRequest;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Default provider endpoint.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.jdoodle.com/v1/execute";

/// Default runtime version selector sent with every request.
pub const DEFAULT_VERSION_INDEX: &str = "0";

/// Raw answer from the provider, before any mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can run a validated request against a remote engine.
///
/// Implementations make exactly one attempt per call. Transport failures are
/// reported as [`RelayError::Transport`]; any HTTP answer, successful or not,
/// is returned as a [`ProviderResponse`].
#[async_trait]
pub trait ExecutionProvider: Send + Sync + Clone + 'static {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ProviderResponse>;

    /// Human readable provider name for logs.
    fn name(&self) -> &str {
        "execution-provider"
    }
}

/// Server-held credentials for the provider. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    client_id: String,
    client_secret: String,
}

impl ProviderCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(RelayError::config_error(
                "Provider client id and client secret must both be set",
            ));
        }
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &"<redacted>")
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Payload posted to the provider.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderPayload<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    script: &'a str,
    language: &'a str,
    version_index: &'a str,
}

/// Configuration for [`HttpExecutionProvider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub url: String,
    pub credentials: ProviderCredentials,
    pub version_index: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            url: DEFAULT_PROVIDER_URL.to_string(),
            credentials,
            version_index: DEFAULT_VERSION_INDEX.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_version_index(mut self, version_index: impl Into<String>) -> Self {
        self.version_index = version_index.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Provider reached over HTTP with a JSON payload.
#[derive(Debug, Clone)]
pub struct HttpExecutionProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl HttpExecutionProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[async_trait]
impl ExecutionProvider for HttpExecutionProvider {
    async fn execute(&self, request: &ExecuteRequest) -> Result<ProviderResponse> {
        let payload = ProviderPayload {
            client_id: &self.config.credentials.client_id,
            client_secret: &self.config.credentials.client_secret,
            script: &request.script,
            language: &request.language,
            version_index: &self.config.version_index,
        };

        let response = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RelayError::transport(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::transport(e.without_url().to_string()))?;

        log::debug!(
            "Provider answered HTTP {} with {} bytes",
            status,
            body.len()
        );

        Ok(ProviderResponse { status, body })
    }

    fn name(&self) -> &str {
        &self.config.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_redacted_in_debug() {
        let credentials = ProviderCredentials::new("id-123", "secret-456").unwrap();
        let config = ProviderConfig::new(credentials);
        let printed = format!("{:?}", HttpExecutionProvider::new(config));
        assert!(!printed.contains("id-123"));
        assert!(!printed.contains("secret-456"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_blank_credentials_rejected() {
        assert!(ProviderCredentials::new("", "secret").is_err());
        assert!(ProviderCredentials::new("id", "  ").is_err());
    }

    #[test]
    fn test_payload_field_names() {
        let payload = ProviderPayload {
            client_id: "id",
            client_secret: "secret",
            script: "print(1)",
            language: "python3",
            version_index: "0",
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "clientId": "id",
                "clientSecret": "secret",
                "script": "print(1)",
                "language": "python3",
                "versionIndex": "0"
            })
        );
    }

    #[test]
    fn test_provider_response_success_range() {
        assert!(ProviderResponse::new(200, "{}").is_success());
        assert!(ProviderResponse::new(204, "").is_success());
        assert!(!ProviderResponse::new(302, "").is_success());
        assert!(!ProviderResponse::new(500, "").is_success());
    }
}
