//! Error types for the client orchestrator.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the orchestrator and its backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// A widget failed to construct or attach. Only that widget is affected.
    #[error("Failed to initialize {widget}: {message}")]
    Initialization { widget: String, message: String },

    /// The widget libraries never became available.
    #[error("Widget libraries did not load within {0:?}")]
    LibraryLoadTimeout(Duration),

    /// The execution relay could not be reached.
    #[error("Execution relay unreachable: {0}")]
    Transport(String),

    /// The run action was triggered before the editor became interactive.
    #[error("Run is not available until the editor is interactive")]
    NotInteractive,

    /// A run was requested while another one is still outstanding.
    #[error("Request {0} is still in flight")]
    Busy(Uuid),

    /// The orchestrator was torn down.
    #[error("Orchestrator has been torn down")]
    TornDown,
}

impl ClientError {
    /// Create a new initialization error.
    pub fn initialization(widget: impl Into<String>, message: impl ToString) -> Self {
        Self::Initialization {
            widget: widget.into(),
            message: message.to_string(),
        }
    }

    /// Create a new transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Failures reported by widget implementations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WidgetError {
    #[error("construction failed: {0}")]
    Construct(String),

    #[error("failed to attach to mount point '{mount}': {message}")]
    Mount { mount: String, message: String },
}
