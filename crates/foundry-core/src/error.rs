//! Error types shared across foundry crates.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// An error reported by the cloud provider.
///
/// `message` is the provider's text as received. It is never reworded, since
/// it is usually the most actionable thing the user will see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    /// Provider error code, when one could be recognised (e.g. `QuotaExceeded`).
    pub code: Option<String>,
    /// Raw provider message.
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Build an error from CLI stderr output.
    ///
    /// The provider CLI prints errors as `ERROR: (Code) message`; the first
    /// parenthesised token that looks like an identifier is taken as the code.
    /// The message is the trimmed stderr text.
    pub fn from_cli_stderr(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        Self {
            code: extract_code(&message),
            message,
        }
    }

    /// True if the provider reported this code (case-insensitive).
    pub fn has_code(&self, code: &str) -> bool {
        self.code
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(code))
    }
}

fn extract_code(text: &str) -> Option<String> {
    let mut rest = text;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            return None;
        };
        let candidate = &after[..close];
        if !candidate.is_empty()
            && candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            && candidate.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        {
            return Some(candidate.to_string());
        }
        rest = &after[close + 1..];
    }
    None
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// A deployment request that cannot be submitted as given.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("template file not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("parameters file not found: {}", .0.display())]
    ParametersNotFound(PathBuf),

    #[error("resource group name must not be empty")]
    EmptyResourceGroup,

    #[error("invalid deployment name '{name}': {reason}")]
    InvalidDeploymentName { name: String, reason: String },

    #[error("invalid parameter override '{0}': expected key=value")]
    InvalidParameterOverride(String),
}

/// Errors loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
