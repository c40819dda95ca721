//! Request, result and error body types exchanged with the relay.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{TypesError, TypesResult};

/// Body of `POST /api/execute`.
///
/// Both fields are required. Missing or `null` fields deserialize to an empty
/// string so that [`ExecuteRequest::validate`] reports them uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    /// Source code to execute.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub script: String,
    /// Provider language identifier, e.g. `python3`.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub language: String,
}

impl ExecuteRequest {
    pub fn new(script: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            language: language.into(),
        }
    }

    /// Check that both fields carry content.
    pub fn validate(&self) -> TypesResult<()> {
        if self.script.trim().is_empty() {
            return Err(TypesError::missing_field("script"));
        }
        if self.language.trim().is_empty() {
            return Err(TypesError::missing_field("language"));
        }
        Ok(())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Classification of an execution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    Success,
    UpstreamError,
    ValidationError,
    InternalError,
}

impl StatusKind {
    /// Classify a relay HTTP status code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200..=299 => StatusKind::Success,
            400..=499 => StatusKind::ValidationError,
            502 => StatusKind::UpstreamError,
            _ => StatusKind::InternalError,
        }
    }
}

/// Outcome of a single run, as consumed by the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub output: String,
    pub status_kind: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Set when the result was derived locally without executing anything.
    #[serde(default)]
    pub simulated: bool,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            status_kind: StatusKind::Success,
            detail: None,
            simulated: false,
        }
    }

    pub fn simulated(output: impl Into<String>) -> Self {
        Self {
            simulated: true,
            ..Self::success(output)
        }
    }

    pub fn upstream_error(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            output: message.into(),
            status_kind: StatusKind::UpstreamError,
            detail,
            simulated: false,
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            status_kind: StatusKind::ValidationError,
            detail: None,
            simulated: false,
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            output: message.into(),
            status_kind: StatusKind::InternalError,
            detail: None,
            simulated: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_kind == StatusKind::Success
    }

    /// Build a success result from a provider payload passed through the relay.
    ///
    /// Providers conventionally report program output in an `output` field;
    /// anything else is shown verbatim.
    pub fn from_provider_body(body: &Value) -> Self {
        let output = ProviderOutput::from_value(body);
        match output.output {
            Some(text) => Self::success(text),
            None => match output.error {
                Some(error) => Self::upstream_error(error, Some(body.to_string())),
                None => Self::success(body.to_string()),
            },
        }
    }
}

/// Fields conventionally present in a provider execution payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutput {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub memory: Option<Value>,
    #[serde(default)]
    pub cpu_time: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProviderOutput {
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Error body returned by the relay for every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
            upstream_status: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_upstream_status(mut self, status: u16) -> Self {
        self.upstream_status = Some(status.to_string());
        self
    }
}
