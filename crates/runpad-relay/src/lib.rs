//! Execution relay for the runpad sandbox.
//!
//! Exposes a single `POST /api/execute` endpoint that validates a
//! `{script, language}` request, forwards it to a remote execution provider
//! with server-held credentials, and maps the provider's answer onto a stable
//! contract: pass-through on success, 400 for invalid requests, 502 for
//! provider failures and a generic 500 for anything relay-side. The relay is
//! stateless between requests.

pub mod error;
pub mod provider;

pub use error::{RelayError, Result, GENERIC_FAILURE_MESSAGE, UPSTREAM_FAILURE_MESSAGE};
pub use provider::{
    ExecutionProvider, HttpExecutionProvider, ProviderConfig, ProviderCredentials,
    ProviderResponse, DEFAULT_PROVIDER_URL, DEFAULT_VERSION_INDEX,
};

pub use runpad_types::{ErrorBody, ExecuteRequest};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Json as AxumJson, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Router};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Configuration for the relay's HTTP surface.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024, // 1MB
            enable_logging: true,
        }
    }
}

impl RelayConfig {
    /// Create a new relay configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| RelayError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Enable or disable CORS.
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    /// Set allowed CORS origins. An empty list keeps the permissive default.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = if origins.is_empty() {
            None
        } else {
            Some(origins)
        };
        self
    }

    /// Set maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Shared state handed to every handler. Nothing in it is mutated.
#[derive(Clone)]
pub struct AppState<P: ExecutionProvider> {
    pub provider: P,
    pub config: RelayConfig,
}

/// Map a provider answer onto the client contract.
///
/// Non-2xx answers become [`RelayError::Upstream`]; 2xx bodies must parse as
/// JSON and are returned unchanged.
pub fn map_provider_response(response: ProviderResponse) -> Result<Value> {
    if !response.is_success() {
        return Err(RelayError::upstream(response.status, response.body));
    }

    serde_json::from_str(&response.body)
        .map_err(|e| RelayError::InvalidUpstreamBody(e.to_string()))
}

/// Handler for the /api/execute POST endpoint.
async fn execute_handler<P: ExecutionProvider>(
    State(app_state): State<AppState<P>>,
    payload: std::result::Result<AxumJson<ExecuteRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let AxumJson(request) = payload.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            RelayError::PayloadTooLarge
        } else {
            RelayError::validation(rejection.body_text())
        }
    })?;

    if let Err(e) = request.validate() {
        log::warn!("Rejected execution request: {}", e);
        return Err(e.into());
    }

    log::info!(
        "Relaying {} bytes of '{}' to {}",
        request.script.len(),
        request.language,
        app_state.provider.name()
    );

    let response = app_state.provider.execute(&request).await.map_err(|e| {
        log::error!("Execution provider call failed: {}", e);
        e
    })?;

    match map_provider_response(response) {
        Ok(body) => Ok(Json(body)),
        Err(e @ RelayError::Upstream { .. }) => {
            log::warn!("{}", e);
            Err(e)
        }
        Err(e) => {
            log::error!("Failed to relay provider response: {}", e);
            Err(e)
        }
    }
}

/// The execution relay server.
pub struct RelayServer<P: ExecutionProvider> {
    provider: P,
    config: RelayConfig,
}

impl<P: ExecutionProvider> RelayServer<P> {
    /// Create a new relay with the given provider and default configuration.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: RelayConfig::default(),
        }
    }

    /// Create a new relay with custom configuration.
    pub fn with_config(provider: P, config: RelayConfig) -> Self {
        Self { provider, config }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            provider: self.provider.clone(),
            config: self.config.clone(),
        };

        let mut router = Router::new()
            .route(
                "/health",
                get(|| async {
                    Json(HealthResponse {
                        status: "healthy".to_string(),
                        timestamp: chrono::Utc::now(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    })
                }),
            )
            .route(
                "/api/execute",
                // OPTIONS answers CORS preflight
                post(execute_handler::<P>).options(|| async { StatusCode::OK }),
            )
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>,
                 next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    if uri.path() == "/health" {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    log::info!(
                        "Response {} {} completed in {:?}",
                        request_id,
                        response.status(),
                        start.elapsed()
                    );

                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = match self.config.cors_origins {
                Some(ref origins) => {
                    let origins: std::result::Result<Vec<_>, _> =
                        origins.iter().map(|s| s.parse()).collect();
                    match origins {
                        Ok(origins) => CorsLayer::new()
                            .allow_origin(origins)
                            .allow_methods(Any)
                            .allow_headers(Any),
                        Err(_) => {
                            log::warn!("Invalid CORS origin configured, falling back to permissive");
                            CorsLayer::permissive()
                        }
                    }
                }
                None => CorsLayer::permissive(),
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            RelayError::config_error(format!(
                "Failed to bind to {}: {}",
                self.config.bind_addr, e
            ))
        })
    }

    /// Serve on an already bound listener until the shutdown signal fires.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let addr = listener.local_addr()?;

        log::info!("runpad relay listening on {}", addr);
        log::info!("Health check: http://{}/health", addr);
        log::info!("Execute endpoint: http://{}/api/execute", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| RelayError::internal(format!("Server error: {}", e)))?;

        log::info!("runpad relay shut down gracefully");
        Ok(())
    }

    /// Start the server with graceful shutdown support.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve_listener(listener, shutdown_signal).await
    }
}

/// Utility function to create a shutdown signal from Ctrl+C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
