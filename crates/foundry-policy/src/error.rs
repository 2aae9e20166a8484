//! Error types for the permission workflow.

use foundry_core::{ProviderError, Scope};
use thiserror::Error;

/// Faults in the permission workflow.
///
/// A missing role is not an error: it is reported as a
/// [`PermissionGap`](crate::PermissionGap) in the audit report.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Role assignments could not be listed, e.g. the principal or scope does not exist.
    #[error("could not look up role assignments for principal '{principal}' at scope '{scope}'")]
    Lookup {
        principal: String,
        scope: Scope,
        #[source]
        source: ProviderError,
    },

    /// The provider rejected a role assignment.
    #[error("could not assign role '{role}' to principal '{principal}' at scope '{scope}'")]
    Remediation {
        principal: String,
        role: String,
        scope: Scope,
        #[source]
        source: ProviderError,
    },

    /// Nothing to check.
    #[error("no required roles given")]
    EmptyRequirement,

    /// Unknown preset name.
    #[error("unknown role preset '{name}' (known: {known})")]
    UnknownPreset { name: String, known: String },
}
