//! Permission auditing.

use crate::RoleAssignmentApi;
use crate::error::PermissionError;
use foundry_core::{PermissionRequirement, RoleAssignment, Scope, SessionContext};
use serde::Serialize;
use std::sync::Arc;

/// A required role the principal does not hold.
///
/// Only [`AuditReport`] hands these out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionGap {
    principal: String,
    role: String,
    scope: Scope,
}

impl PermissionGap {
    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The provider CLI command that closes this gap.
    pub fn remediation_command(&self, cli: &str) -> String {
        format!(
            "{cli} role assignment create --assignee {} --role \"{}\" --scope {}",
            self.principal, self.role, self.scope
        )
    }
}

/// Outcome of an audit.
///
/// `satisfied` and `missing` partition the requirement: together they hold
/// every required role exactly once, in requirement order.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub principal: String,
    pub scope: Scope,
    pub satisfied: Vec<String>,
    pub missing: Vec<String>,
    /// Every assignment the principal currently holds at the scope.
    pub held: Vec<RoleAssignment>,
}

impl AuditReport {
    /// Build a report from the assignments a principal holds.
    pub fn from_assignments(
        principal: &str,
        scope: &Scope,
        requirement: &PermissionRequirement,
        held: Vec<RoleAssignment>,
    ) -> Self {
        let (satisfied, missing): (Vec<String>, Vec<String>) = requirement
            .roles()
            .iter()
            .cloned()
            .partition(|role| held.iter().any(|a| a.grants(role)));

        Self {
            principal: principal.to_string(),
            scope: scope.clone(),
            satisfied,
            missing,
            held,
        }
    }

    /// True when no required role is missing.
    pub fn is_healthy(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn gaps(&self) -> impl Iterator<Item = PermissionGap> + '_ {
        self.missing.iter().map(|role| self.gap_for(role))
    }

    /// The gap for `role`, if the audit found it missing.
    pub fn gap(&self, role: &str) -> Option<PermissionGap> {
        self.missing
            .iter()
            .find(|r| r.eq_ignore_ascii_case(role))
            .map(|r| self.gap_for(r))
    }

    fn gap_for(&self, role: &str) -> PermissionGap {
        PermissionGap {
            principal: self.principal.clone(),
            role: role.to_string(),
            scope: self.scope.clone(),
        }
    }
}

/// Compares held role assignments against a required-role checklist.
pub struct PermissionAuditor {
    api: Arc<dyn RoleAssignmentApi>,
}

impl PermissionAuditor {
    pub fn new(api: Arc<dyn RoleAssignmentApi>) -> Self {
        Self { api }
    }

    /// Audit `principal` at `scope`. Read-only.
    pub async fn audit(
        &self,
        ctx: &SessionContext,
        principal: &str,
        scope: &Scope,
        requirement: &PermissionRequirement,
    ) -> Result<AuditReport, PermissionError> {
        if requirement.is_empty() {
            return Err(PermissionError::EmptyRequirement);
        }

        let held = self
            .api
            .list(ctx, principal, scope)
            .await
            .map_err(|source| PermissionError::Lookup {
                principal: principal.to_string(),
                scope: scope.clone(),
                source,
            })?;

        let report = AuditReport::from_assignments(principal, scope, requirement, held);
        tracing::info!(
            principal = %principal,
            scope = %scope,
            satisfied = report.satisfied.len(),
            missing = report.missing.len(),
            "Permission audit complete"
        );
        Ok(report)
    }
}
