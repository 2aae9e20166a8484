//! Permission diagnostics for foundry-deploy.
//!
//! The workflow is split on purpose into two explicit steps:
//!
//! 1. [`PermissionAuditor::audit`] reads the role assignments a principal
//!    holds at a scope and partitions a [`PermissionRequirement`] into
//!    satisfied and missing roles. It never mutates anything.
//! 2. [`PermissionRemediator::remediate`] grants one missing role. It only
//!    accepts a [`PermissionGap`], which can only be obtained from an
//!    [`AuditReport`], so a grant is always preceded by an audit that found
//!    the gap.
//!
//! A principal that cannot be looked up ([`PermissionError::Lookup`]) is a
//! different failure from a principal that lacks a role (a gap in the report).
//!
//! [`PermissionRequirement`]: foundry_core::PermissionRequirement

pub mod auditor;
pub mod error;
pub mod presets;
pub mod remediator;

use async_trait::async_trait;
use foundry_core::{ProviderError, RoleAssignment, Scope, SessionContext};

pub use auditor::{AuditReport, PermissionAuditor, PermissionGap};
pub use error::PermissionError;
pub use presets::{builtin_presets, resolve_preset};
pub use remediator::{PermissionRemediator, RemediationOutcome};

/// Provider error code for a grant that already exists.
pub const ASSIGNMENT_EXISTS_CODE: &str = "RoleAssignmentExists";

/// Access-control API of the cloud provider.
#[async_trait]
pub trait RoleAssignmentApi: Send + Sync {
    /// List assignments held by `principal` at `scope`, including inherited ones.
    async fn list(
        &self,
        ctx: &SessionContext,
        principal: &str,
        scope: &Scope,
    ) -> Result<Vec<RoleAssignment>, ProviderError>;

    /// Create one assignment.
    ///
    /// Implementations report an existing identical assignment as an error
    /// with code [`ASSIGNMENT_EXISTS_CODE`].
    async fn create(
        &self,
        ctx: &SessionContext,
        principal: &str,
        role: &str,
        scope: &Scope,
    ) -> Result<RoleAssignment, ProviderError>;
}
