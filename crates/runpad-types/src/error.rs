//! Error types for runpad wire types.

use thiserror::Error;

/// Errors raised while validating or interpreting wire types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypesError {
    /// A required field was missing or blank.
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A language identifier could not be recognised.
    #[error("Unsupported language: {language}")]
    UnsupportedLanguage { language: String },
}

impl TypesError {
    /// Create a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create a new unsupported language error.
    pub fn unsupported_language(language: impl Into<String>) -> Self {
        Self::UnsupportedLanguage {
            language: language.into(),
        }
    }
}

/// Result type for wire type operations.
pub type TypesResult<T> = Result<T, TypesError>;
