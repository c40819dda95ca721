//! Error types for the execution relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use runpad_types::{ErrorBody, TypesError};
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Message returned to clients for every relay-side failure. The cause is
/// only ever logged.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to execute code";

/// Message returned to clients when the provider rejects a request.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Execution provider returned an error";

/// Errors that can occur while relaying an execution request.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The client request was malformed or incomplete
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The request body exceeded the configured limit
    #[error("Request body too large")]
    PayloadTooLarge,

    /// The provider answered with a non-success status
    #[error("Execution provider returned HTTP {status}")]
    Upstream { status: u16, body: String },

    /// The provider could not be reached or the exchange broke off
    #[error("Failed to reach execution provider: {0}")]
    Transport(String),

    /// The provider answered 2xx with a body that is not JSON
    #[error("Execution provider returned an unreadable body: {0}")]
    InvalidUpstreamBody(String),

    /// Relay configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal relay error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Create a new validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new upstream error.
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    /// Create a new transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Validation(_) => 400,
            RelayError::PayloadTooLarge => 413,
            RelayError::Upstream { .. } => 502,
            RelayError::Transport(_)
            | RelayError::InvalidUpstreamBody(_)
            | RelayError::Config(_)
            | RelayError::Io(_)
            | RelayError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation_error",
            RelayError::PayloadTooLarge => "payload_too_large",
            RelayError::Upstream { .. } => "upstream_error",
            RelayError::Transport(_) => "transport_error",
            RelayError::InvalidUpstreamBody(_) => "invalid_upstream_body",
            RelayError::Config(_) => "config_error",
            RelayError::Io(_) => "io_error",
            RelayError::Internal(_) => "internal_error",
        }
    }

    /// Body sent to the client. Only validation and upstream errors carry
    /// their details; everything else collapses to a generic message.
    pub fn to_error_body(&self) -> ErrorBody {
        match self {
            RelayError::Validation(_) | RelayError::PayloadTooLarge => {
                ErrorBody::new(self.to_string())
            }
            RelayError::Upstream { status, body } => ErrorBody::new(UPSTREAM_FAILURE_MESSAGE)
                .with_detail(body.clone())
                .with_upstream_status(*status),
            _ => ErrorBody::new(GENERIC_FAILURE_MESSAGE),
        }
    }
}

impl From<TypesError> for RelayError {
    fn from(err: TypesError) -> Self {
        RelayError::Validation(err.to_string())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_error_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RelayError::validation("x").status_code(), 400);
        assert_eq!(RelayError::upstream(401, "nope").status_code(), 502);
        assert_eq!(RelayError::transport("refused").status_code(), 500);
        assert_eq!(RelayError::PayloadTooLarge.status_code(), 413);
    }

    #[test]
    fn test_internal_errors_hide_cause() {
        let body = RelayError::transport("dns error: upstream.internal:443").to_error_body();
        assert_eq!(body.error, GENERIC_FAILURE_MESSAGE);
        assert!(body.detail.is_none());

        let body = RelayError::InvalidUpstreamBody("expected value at line 1".into()).to_error_body();
        assert_eq!(body.error, GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn test_upstream_error_body_carries_raw_body() {
        let body = RelayError::upstream(429, "{\"error\":\"Daily limit reached\"}").to_error_body();
        assert_eq!(body.error, UPSTREAM_FAILURE_MESSAGE);
        assert_eq!(body.detail.as_deref(), Some("{\"error\":\"Daily limit reached\"}"));
        assert_eq!(body.upstream_status.as_deref(), Some("429"));
    }

    #[test]
    fn test_types_error_becomes_validation() {
        let err: RelayError = TypesError::missing_field("script").into();
        assert_eq!(err.error_type(), "validation_error");
        assert_eq!(err.to_error_body().error, "Invalid request: Missing required field: script");
    }
}
