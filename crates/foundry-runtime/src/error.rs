//! Error taxonomy of the deploy pipeline.

use foundry_core::{ProviderError, RequestError};
use thiserror::Error;

/// A fatal failure of one pipeline stage. Each variant maps to one stage.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The request was rejected before contacting the provider.
    #[error("invalid deployment request")]
    InvalidRequest(#[from] RequestError),

    /// Login did not succeed, or the requested subscription could not be selected.
    #[error("authentication failed: {reason}")]
    Authentication {
        reason: String,
        #[source]
        source: Option<ProviderError>,
    },

    /// The resource group could not be looked up or created.
    #[error("failed to provision resource group '{group}'")]
    Provisioning {
        group: String,
        #[source]
        source: ProviderError,
    },

    /// The deployment failed. `message` is the provider's text, unmodified.
    #[error("deployment '{name}' failed: {message}")]
    Deployment { name: String, message: String },
}

impl DeployError {
    pub(crate) fn authentication(reason: impl Into<String>, source: Option<ProviderError>) -> Self {
        Self::Authentication {
            reason: reason.into(),
            source,
        }
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
