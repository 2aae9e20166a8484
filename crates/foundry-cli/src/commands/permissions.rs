//! `foundry-deploy permissions` commands.
//!
//! `check` audits and prints what is missing, with the command that would fix
//! each gap. It never changes anything. `grant` is the only command that
//! creates role assignments, and it audits first.

use anyhow::Result;
use clap::{Args, Subcommand};
use foundry_core::{DeployConfig, FoundryConfig, PermissionRequirement, PermissionsConfig, Scope};
use foundry_policy::{AuditReport, PermissionError, resolve_preset};
use foundry_runtime::{GrantOutcome, PermissionDiagnostics, ScopeTarget};
use std::io::Write;

use super::Providers;

#[derive(Subcommand, Debug)]
pub enum PermissionsCommand {
    /// Report which required roles a principal holds and which are missing
    Check(CheckArgs),

    /// Assign one role to a principal if an audit shows it missing
    Grant(GrantArgs),
}

/// Where to look. Without `--scope` or `--account` the resource group is used.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Full resource id to audit at
    #[arg(long, conflicts_with = "account")]
    pub scope: Option<String>,

    /// AI services account name, inside --resource-group-name
    #[arg(long)]
    pub account: Option<String>,

    /// Resource group of the account, or the scope itself when no account is given
    #[arg(long, env = "FOUNDRY_RESOURCE_GROUP")]
    pub resource_group_name: Option<String>,

    /// Subscription id or name
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,
}

impl TargetArgs {
    pub fn target(&self, config: &DeployConfig) -> ScopeTarget {
        if let Some(scope) = &self.scope {
            return ScopeTarget::Explicit(Scope::new(scope.clone()));
        }
        let group = self
            .resource_group_name
            .clone()
            .unwrap_or_else(|| config.resource_group_name.clone());
        match &self.account {
            Some(account) => ScopeTarget::Account {
                resource_group: group,
                account: account.clone(),
            },
            None => ScopeTarget::ResourceGroup(group),
        }
    }

    pub fn subscription(&self, config: &DeployConfig) -> Option<String> {
        self.subscription_id
            .clone()
            .or_else(|| config.subscription_id.clone())
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct CheckArgs {
    /// Object id, user principal name or app id to audit
    #[arg(long)]
    pub principal: String,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Required role (repeatable). Defaults to permissions.required_roles.
    #[arg(long = "role")]
    pub roles: Vec<String>,

    /// Add the roles of a named preset
    #[arg(long)]
    pub preset: Option<String>,

    /// Exit with status 1 when any role is missing
    #[arg(long, default_value_t = false)]
    pub fail_on_missing: bool,
}

impl CheckArgs {
    /// `--role` and `--preset` combined, or the configured roles when neither is given.
    pub fn requirement(
        &self,
        config: &PermissionsConfig,
    ) -> Result<PermissionRequirement, PermissionError> {
        let mut requirement = PermissionRequirement::new(self.roles.iter().cloned());
        if let Some(name) = &self.preset {
            requirement = requirement.merged(&resolve_preset(name, &config.presets)?);
        }
        if requirement.is_empty() {
            requirement = PermissionRequirement::new(config.required_roles.iter().cloned());
        }
        Ok(requirement)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct GrantArgs {
    /// Object id, user principal name or app id to grant to
    #[arg(long)]
    pub principal: String,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Role to assign
    #[arg(long)]
    pub role: String,
}

/// Run `permissions check`. Returns false when the run should exit non-zero.
pub async fn check(
    args: &CheckArgs,
    config: &FoundryConfig,
    providers: Providers,
    out: &mut dyn Write,
) -> Result<bool> {
    let requirement = args.requirement(&config.permissions)?;
    let diagnostics = PermissionDiagnostics::new(providers.session, providers.roles);

    let report = diagnostics
        .check(
            args.target.subscription(&config.deploy).as_deref(),
            &args.principal,
            &args.target.target(&config.deploy),
            &requirement,
        )
        .await?;

    print_report(out, &report, &config.provider.cli_path)?;
    Ok(report.is_healthy() || !args.fail_on_missing)
}

fn print_report(out: &mut dyn Write, report: &AuditReport, cli: &str) -> std::io::Result<()> {
    writeln!(out, "Principal: {}", report.principal)?;
    writeln!(out, "Scope:     {}", report.scope)?;
    for role in &report.satisfied {
        writeln!(out, "  ✔ {role}")?;
    }
    for role in &report.missing {
        writeln!(out, "  ✘ {role} (missing)")?;
    }

    if report.is_healthy() {
        writeln!(out, "All {} required role(s) assigned.", report.satisfied.len())?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(
        out,
        "{} of {} required role(s) missing. To assign them:",
        report.missing.len(),
        report.missing.len() + report.satisfied.len()
    )?;
    for gap in report.gaps() {
        writeln!(out, "  {}", gap.remediation_command(cli))?;
    }
    Ok(())
}

/// Run `permissions grant`.
pub async fn grant(
    args: &GrantArgs,
    config: &FoundryConfig,
    providers: Providers,
    out: &mut dyn Write,
) -> Result<()> {
    let diagnostics = PermissionDiagnostics::new(providers.session, providers.roles);

    let outcome = diagnostics
        .grant(
            args.target.subscription(&config.deploy).as_deref(),
            &args.principal,
            &args.target.target(&config.deploy),
            &args.role,
        )
        .await?;

    match outcome {
        GrantOutcome::AlreadySatisfied(report) => writeln!(
            out,
            "✔ '{}' already holds '{}' at {}; nothing to do.",
            report.principal, args.role, report.scope
        )?,
        GrantOutcome::Granted(outcome) if outcome.created => writeln!(
            out,
            "✔ Assigned '{}' to '{}' at {}",
            outcome.assignment.role, outcome.assignment.principal, outcome.assignment.scope
        )?,
        GrantOutcome::Granted(outcome) => writeln!(
            out,
            "✔ '{}' was already assigned to '{}' at {}",
            outcome.assignment.role, outcome.assignment.principal, outcome.assignment.scope
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_runtime::DiagnosticError;
    use foundry_runtime::testing::{InMemoryCloud, sample_identity};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const PRINCIPAL: &str = "11111111-2222-3333-4444-555555555555";

    fn account_args() -> TargetArgs {
        TargetArgs {
            account: Some("aif-dev".into()),
            ..Default::default()
        }
    }

    fn account_scope() -> Scope {
        Scope::ai_account("sub-1", "rg-aifoundry-dev", "aif-dev")
    }

    #[test]
    fn test_target_resolution() {
        let config = DeployConfig::default();
        assert_eq!(
            TargetArgs::default().target(&config),
            ScopeTarget::ResourceGroup("rg-aifoundry-dev".into())
        );
        assert_eq!(
            account_args().target(&config),
            ScopeTarget::Account {
                resource_group: "rg-aifoundry-dev".into(),
                account: "aif-dev".into()
            }
        );
        let explicit = TargetArgs {
            scope: Some("/subscriptions/s".into()),
            account: None,
            ..Default::default()
        };
        assert_eq!(
            explicit.target(&config),
            ScopeTarget::Explicit(Scope::subscription("s"))
        );
    }

    #[test]
    fn test_requirement_defaults_to_configured_roles() {
        let args = CheckArgs::default();
        let requirement = args.requirement(&PermissionsConfig::default()).unwrap();
        assert_eq!(requirement.roles(), &["Azure AI User".to_string()]);
    }

    #[test]
    fn test_requirement_merges_roles_and_preset() {
        let config = PermissionsConfig {
            presets: BTreeMap::from([(
                "ops".to_string(),
                vec!["Reader".to_string(), "Azure AI User".to_string()],
            )]),
            ..Default::default()
        };
        let args = CheckArgs {
            roles: vec!["azure ai user".into()],
            preset: Some("ops".into()),
            ..Default::default()
        };
        let requirement = args.requirement(&config).unwrap();
        assert_eq!(
            requirement.roles(),
            &["azure ai user".to_string(), "Reader".to_string()]
        );
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let args = CheckArgs {
            preset: Some("nope".into()),
            ..Default::default()
        };
        assert!(matches!(
            args.requirement(&PermissionsConfig::default()),
            Err(PermissionError::UnknownPreset { .. })
        ));
    }

    #[tokio::test]
    async fn test_check_lists_gap_with_remediation_and_exits_zero() {
        let cloud = Arc::new(
            InMemoryCloud::signed_in(sample_identity("sub-1"))
                .with_assignment(PRINCIPAL, "Contributor", &account_scope()),
        );
        let args = CheckArgs {
            principal: PRINCIPAL.into(),
            target: account_args(),
            ..Default::default()
        };

        let mut out = Vec::new();
        let passed = check(
            &args,
            &FoundryConfig::default(),
            Providers::in_memory(cloud.clone()),
            &mut out,
        )
        .await
        .unwrap();

        assert!(passed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("✘ Azure AI User (missing)"));
        assert!(text.contains(&format!(
            "az role assignment create --assignee {PRINCIPAL} --role \"Azure AI User\" --scope {}",
            account_scope()
        )));
        assert!(cloud.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_check_fails_on_missing_when_asked() {
        let cloud = Arc::new(InMemoryCloud::signed_in(sample_identity("sub-1")));
        let args = CheckArgs {
            principal: PRINCIPAL.into(),
            target: account_args(),
            fail_on_missing: true,
            ..Default::default()
        };

        let mut out = Vec::new();
        let passed = check(&args, &FoundryConfig::default(), Providers::in_memory(cloud), &mut out)
            .await
            .unwrap();
        assert!(!passed);
    }

    #[tokio::test]
    async fn test_check_lookup_failure_is_an_error_not_a_gap() {
        let cloud = Arc::new(
            InMemoryCloud::signed_in(sample_identity("sub-1")).with_unknown_principal("ghost"),
        );
        let args = CheckArgs {
            principal: "ghost".into(),
            target: account_args(),
            ..Default::default()
        };

        let mut out = Vec::new();
        let err = check(&args, &FoundryConfig::default(), Providers::in_memory(cloud), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<DiagnosticError>(),
            Some(DiagnosticError::Permission(PermissionError::Lookup { .. }))
        ));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_grant_then_grant_again() {
        let cloud = Arc::new(InMemoryCloud::signed_in(sample_identity("sub-1")));
        let args = GrantArgs {
            principal: PRINCIPAL.into(),
            target: account_args(),
            role: "Azure AI User".into(),
        };
        let config = FoundryConfig::default();

        let mut first = Vec::new();
        grant(&args, &config, Providers::in_memory(cloud.clone()), &mut first)
            .await
            .unwrap();
        let mut second = Vec::new();
        grant(&args, &config, Providers::in_memory(cloud.clone()), &mut second)
            .await
            .unwrap();

        assert!(String::from_utf8(first).unwrap().starts_with("✔ Assigned 'Azure AI User'"));
        assert!(String::from_utf8(second).unwrap().contains("nothing to do"));
        assert_eq!(cloud.assignments().len(), 1);
    }
}
