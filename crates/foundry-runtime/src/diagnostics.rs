//! Permission diagnostics: resolve the session, audit, and grant on request.

use crate::error::DeployError;
use crate::provider::SessionProvider;
use crate::session::ensure_session;
use foundry_core::{PermissionRequirement, Scope, SessionContext};
use foundry_policy::{
    AuditReport, PermissionAuditor, PermissionError, PermissionRemediator, RemediationOutcome,
    RoleAssignmentApi,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error(transparent)]
    Session(#[from] DeployError),

    #[error(transparent)]
    Permission(#[from] PermissionError),
}

/// Where to check permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTarget {
    /// A full resource id.
    Explicit(Scope),
    /// A resource group in the session's subscription.
    ResourceGroup(String),
    /// An AI services account in a resource group of the session's subscription.
    Account {
        resource_group: String,
        account: String,
    },
}

impl ScopeTarget {
    pub fn resolve(&self, ctx: &SessionContext) -> Scope {
        match self {
            ScopeTarget::Explicit(scope) => scope.clone(),
            ScopeTarget::ResourceGroup(group) => {
                Scope::resource_group(ctx.subscription_id(), group)
            }
            ScopeTarget::Account {
                resource_group,
                account,
            } => Scope::ai_account(ctx.subscription_id(), resource_group, account),
        }
    }
}

/// What `grant` did.
#[derive(Debug, Clone)]
pub enum GrantOutcome {
    /// The audit found nothing to fix.
    AlreadySatisfied(AuditReport),
    /// The audit found the gap and it was closed.
    Granted(RemediationOutcome),
}

pub struct PermissionDiagnostics {
    session: Arc<dyn SessionProvider>,
    auditor: PermissionAuditor,
    remediator: PermissionRemediator,
}

impl PermissionDiagnostics {
    pub fn new(session: Arc<dyn SessionProvider>, roles: Arc<dyn RoleAssignmentApi>) -> Self {
        Self {
            session,
            auditor: PermissionAuditor::new(roles.clone()),
            remediator: PermissionRemediator::new(roles),
        }
    }

    /// Audit `principal` at `target`. Never changes anything.
    pub async fn check(
        &self,
        subscription: Option<&str>,
        principal: &str,
        target: &ScopeTarget,
        requirement: &PermissionRequirement,
    ) -> Result<AuditReport, DiagnosticError> {
        let ctx = ensure_session(self.session.as_ref(), subscription).await?;
        let scope = target.resolve(&ctx);
        Ok(self
            .auditor
            .audit(&ctx, principal, &scope, requirement)
            .await?)
    }

    /// Grant `role` to `principal` at `target` if an audit shows it missing.
    pub async fn grant(
        &self,
        subscription: Option<&str>,
        principal: &str,
        target: &ScopeTarget,
        role: &str,
    ) -> Result<GrantOutcome, DiagnosticError> {
        let ctx = ensure_session(self.session.as_ref(), subscription).await?;
        let scope = target.resolve(&ctx);
        let requirement = PermissionRequirement::new([role]);

        let report = self
            .auditor
            .audit(&ctx, principal, &scope, &requirement)
            .await?;

        match report.gap(role) {
            Some(gap) => Ok(GrantOutcome::Granted(
                self.remediator.remediate(&ctx, &gap).await?,
            )),
            None => Ok(GrantOutcome::AlreadySatisfied(report)),
        }
    }
}
