//! Permission remediation.

use crate::auditor::PermissionGap;
use crate::error::PermissionError;
use crate::{ASSIGNMENT_EXISTS_CODE, RoleAssignmentApi};
use foundry_core::{RoleAssignment, SessionContext};
use std::sync::Arc;

/// Result of closing a gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationOutcome {
    pub assignment: RoleAssignment,
    /// False when the provider already had the assignment.
    pub created: bool,
}

/// Grants roles that an audit found missing.
pub struct PermissionRemediator {
    api: Arc<dyn RoleAssignmentApi>,
}

impl PermissionRemediator {
    pub fn new(api: Arc<dyn RoleAssignmentApi>) -> Self {
        Self { api }
    }

    /// Create exactly the (principal, role, scope) assignment described by `gap`.
    ///
    /// An assignment that already exists counts as success, so this is safe
    /// to re-run.
    pub async fn remediate(
        &self,
        ctx: &SessionContext,
        gap: &PermissionGap,
    ) -> Result<RemediationOutcome, PermissionError> {
        tracing::info!(
            principal = %gap.principal(),
            role = %gap.role(),
            scope = %gap.scope(),
            "Creating role assignment"
        );

        match self
            .api
            .create(ctx, gap.principal(), gap.role(), gap.scope())
            .await
        {
            Ok(assignment) => Ok(RemediationOutcome {
                assignment,
                created: true,
            }),
            Err(err) if err.has_code(ASSIGNMENT_EXISTS_CODE) => {
                tracing::info!(
                    principal = %gap.principal(),
                    role = %gap.role(),
                    "Role assignment already exists"
                );
                Ok(RemediationOutcome {
                    assignment: RoleAssignment::new(
                        gap.principal(),
                        gap.role(),
                        gap.scope().clone(),
                    ),
                    created: false,
                })
            }
            Err(source) => Err(PermissionError::Remediation {
                principal: gap.principal().to_string(),
                role: gap.role().to_string(),
                scope: gap.scope().clone(),
                source,
            }),
        }
    }
}
