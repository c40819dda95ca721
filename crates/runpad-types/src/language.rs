//! Languages understood by the sandbox.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// A source language selectable in the editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Python,
    Java,
    Cpp,
    C,
    JavaScript,
    Rust,
    Go,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::Java,
        Language::Cpp,
        Language::C,
        Language::JavaScript,
        Language::Rust,
        Language::Go,
    ];

    /// Identifier sent to the execution provider as `language`.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::Java => "java",
            Language::Cpp => "cpp17",
            Language::C => "c",
            Language::JavaScript => "nodejs",
            Language::Rust => "rust",
            Language::Go => "go",
        }
    }

    /// Mode name handed to the editor widget for highlighting.
    pub fn editor_mode(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Go => "go",
        }
    }

    /// Guess the language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Language::Python),
            "java" => Some(Language::Java),
            "cpp" | "cc" | "cxx" | "hpp" => Some(Language::Cpp),
            "c" | "h" => Some(Language::C),
            "js" | "mjs" => Some(Language::JavaScript),
            "rs" => Some(Language::Rust),
            "go" => Some(Language::Go),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.editor_mode())
    }
}

impl FromStr for Language {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "cpp" | "c++" | "cpp17" | "cpp14" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "javascript" | "js" | "node" | "nodejs" => Ok(Language::JavaScript),
            "rust" | "rs" => Ok(Language::Rust),
            "go" | "golang" => Ok(Language::Go),
            other => Err(TypesError::unsupported_language(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("python3".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!(" node ".parse::<Language>().unwrap(), Language::JavaScript);
        assert!("cobol".parse::<Language>().is_err());
    }

    #[test]
    fn test_provider_code_parses_back() {
        for language in Language::ALL {
            assert_eq!(language.provider_code().parse::<Language>().unwrap(), language);
        }
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Language::from_extension("PY"), Some(Language::Python));
        assert_eq!(Language::from_extension("cc"), Some(Language::Cpp));
        assert_eq!(Language::from_extension("txt"), None);
    }
}
