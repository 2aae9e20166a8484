//! `foundry-deploy deploy` command implementation.
//!
//! Merges flags, environment and the project file into one
//! [`DeploymentRequest`], runs the pipeline and reports outputs:
//! - to stdout, with follow-up hints
//! - to `--outputs-file` as `{name: {type, value}}` JSON
//! - to the CI workflow summary when `GITHUB_STEP_SUMMARY` is set

use anyhow::{Context, Result};
use clap::Args;
use foundry_core::{
    DeployConfig, DeploymentRequest, FoundryConfig, RequestError, parse_parameter_override,
};
use foundry_runtime::{Orchestrator, report};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::Providers;

/// Environment variable CI runners point at the job summary file.
pub const STEP_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";

#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Target resource group; created when it does not exist
    #[arg(long, env = "FOUNDRY_RESOURCE_GROUP")]
    pub resource_group_name: Option<String>,

    /// Region for a newly created resource group
    #[arg(long, env = "FOUNDRY_LOCATION")]
    pub location: Option<String>,

    /// Subscription id or name to deploy into
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Template to deploy
    #[arg(long, env = "FOUNDRY_TEMPLATE_FILE")]
    pub template_file: Option<PathBuf>,

    /// Parameters file for the template
    #[arg(long, env = "FOUNDRY_PARAMETERS_FILE")]
    pub parameters_file: Option<PathBuf>,

    /// Deployment name. Defaults to "<prefix>-<YYYYMMDD-HHMMSS>".
    #[arg(long)]
    pub deployment_name: Option<String>,

    /// Override one template parameter (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Write deployment outputs to this JSON file
    #[arg(long, env = "FOUNDRY_OUTPUTS_FILE")]
    pub outputs_file: Option<PathBuf>,

    /// Preview the changes without deploying anything
    #[arg(long, default_value_t = false)]
    pub what_if: bool,
}

/// Build the request. Flags (and their environment variables) win over the
/// project file, which already carries the built-in defaults.
pub fn build_request(
    args: &DeployArgs,
    config: &DeployConfig,
) -> Result<DeploymentRequest, RequestError> {
    let mut overrides: Vec<(String, String)> = config
        .parameters
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for raw in &args.set {
        overrides.push(parse_parameter_override(raw)?);
    }

    Ok(DeploymentRequest {
        template_file: args
            .template_file
            .clone()
            .unwrap_or_else(|| config.template_file.clone()),
        parameters_file: Some(
            args.parameters_file
                .clone()
                .unwrap_or_else(|| config.parameters_file.clone()),
        ),
        parameter_overrides: overrides,
        resource_group: args
            .resource_group_name
            .clone()
            .unwrap_or_else(|| config.resource_group_name.clone()),
        location: args
            .location
            .clone()
            .unwrap_or_else(|| config.location.clone()),
        subscription: args
            .subscription_id
            .clone()
            .or_else(|| config.subscription_id.clone()),
        deployment_name: args.deployment_name.clone(),
        name_prefix: config.deployment_prefix.clone(),
    })
}

/// Run `deploy`. Any pipeline failure is returned as the underlying
/// `DeployError`, so its provider text reaches the user unchanged.
pub async fn execute(
    args: &DeployArgs,
    config: &FoundryConfig,
    providers: Providers,
    summary_path: Option<&Path>,
    out: &mut dyn Write,
) -> Result<()> {
    let request = build_request(args, &config.deploy)?;
    tracing::debug!(?request, "Deployment request");

    let orchestrator =
        Orchestrator::new(providers.session, providers.groups, providers.deployments);

    if args.what_if {
        let outcome = orchestrator.preview(&request).await?;
        report::report_preview(out, &outcome.group_name, outcome.preview.as_ref())?;
        return Ok(());
    }

    let outcome = orchestrator.run(&request).await?;
    let outputs = &outcome.result.outputs;

    report::report(out, &outcome.deployment_name, &outcome.group, outputs)?;

    if let Some(path) = args.outputs_file.as_ref().or(config.deploy.outputs_file.as_ref()) {
        report::write_outputs_file(path, outputs)
            .with_context(|| format!("writing deployment outputs to {}", path.display()))?;
        writeln!(out, "Outputs written to {}", path.display())?;
    }

    if let Some(path) = summary_path {
        let summary = report::render_summary(&outcome.deployment_name, &outcome.group, outputs);
        // The deployment already succeeded; a summary write failure must not fail the run.
        if let Err(e) = report::append_summary(path, &summary) {
            tracing::warn!(path = %path.display(), error = %e, "Could not write workflow summary");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::{DeploymentOutputs, OutputValue};
    use foundry_runtime::DeployError;
    use foundry_runtime::testing::{Call, InMemoryCloud, sample_identity};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn project() -> (TempDir, FoundryConfig) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.bicep"), "param environmentName string\n").unwrap();
        std::fs::write(dir.path().join("main.parameters.json"), "{}").unwrap();
        let mut config = FoundryConfig::default();
        config.deploy.template_file = dir.path().join("main.bicep");
        config.deploy.parameters_file = dir.path().join("main.parameters.json");
        (dir, config)
    }

    fn outputs() -> DeploymentOutputs {
        [
            ("aiFoundryName", OutputValue::string("aif-dev-x1")),
            ("projectName", OutputValue::string("proj-dev")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_defaults_come_from_config() {
        let request = build_request(&DeployArgs::default(), &DeployConfig::default()).unwrap();
        assert_eq!(request.resource_group, "rg-aifoundry-dev");
        assert_eq!(request.location, "eastus");
        assert_eq!(request.template_file, PathBuf::from("main.bicep"));
        assert_eq!(request.parameters_file, Some(PathBuf::from("main.parameters.json")));
        assert_eq!(request.name_prefix, "aifoundry-deployment");
        assert_eq!(request.subscription, None);
        assert_eq!(request.deployment_name, None);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = DeployConfig::default();
        config.resource_group_name = "rg-from-file".into();
        config.location = "westeurope".into();
        config.subscription_id = Some("sub-file".into());

        let args = DeployArgs {
            resource_group_name: Some("rg-from-flag".into()),
            subscription_id: Some("sub-flag".into()),
            ..Default::default()
        };
        let request = build_request(&args, &config).unwrap();

        assert_eq!(request.resource_group, "rg-from-flag");
        assert_eq!(request.location, "westeurope");
        assert_eq!(request.subscription.as_deref(), Some("sub-flag"));
    }

    #[test]
    fn test_set_overrides_follow_config_parameters() {
        let mut config = DeployConfig::default();
        config.parameters = BTreeMap::from([("modelName".to_string(), "gpt-4o".to_string())]);
        let args = DeployArgs {
            set: vec!["modelName=gpt-4o-mini".into(), "capacity=10".into()],
            ..Default::default()
        };

        let request = build_request(&args, &config).unwrap();
        assert_eq!(
            request.parameter_overrides,
            vec![
                ("modelName".to_string(), "gpt-4o".to_string()),
                ("modelName".to_string(), "gpt-4o-mini".to_string()),
                ("capacity".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_set_is_rejected() {
        let args = DeployArgs {
            set: vec!["no-equals-sign".into()],
            ..Default::default()
        };
        assert_eq!(
            build_request(&args, &DeployConfig::default()).unwrap_err(),
            RequestError::InvalidParameterOverride("no-equals-sign".into())
        );
    }

    #[tokio::test]
    async fn test_deploy_reports_and_writes_outputs() {
        let (dir, config) = project();
        let cloud = Arc::new(
            InMemoryCloud::signed_in(sample_identity("sub-1")).with_deployment_outputs(outputs()),
        );
        let outputs_path = dir.path().join("out").join("deployment-outputs.json");
        let summary_path = dir.path().join("summary.md");
        let args = DeployArgs {
            outputs_file: Some(outputs_path.clone()),
            ..Default::default()
        };

        let mut out = Vec::new();
        execute(
            &args,
            &config,
            Providers::in_memory(cloud.clone()),
            Some(&summary_path),
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("aiFoundryName: aif-dev-x1"));
        assert!(text.contains("Endpoint: not set"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&outputs_path).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "aiFoundryName": {"type": "String", "value": "aif-dev-x1"},
                "projectName": {"type": "String", "value": "proj-dev"}
            })
        );

        let summary = std::fs::read_to_string(&summary_path).unwrap();
        assert!(summary.contains("| projectName | `proj-dev` |"));
    }

    #[tokio::test]
    async fn test_what_if_changes_nothing() {
        let (_dir, config) = project();
        let cloud = Arc::new(InMemoryCloud::signed_in(sample_identity("sub-1")));
        let args = DeployArgs {
            what_if: true,
            ..Default::default()
        };

        let mut out = Vec::new();
        execute(&args, &config, Providers::in_memory(cloud.clone()), None, &mut out)
            .await
            .unwrap();

        assert!(cloud.mutating_calls().is_empty());
        assert!(String::from_utf8(out).unwrap().contains("does not exist yet"));
    }

    #[tokio::test]
    async fn test_failure_keeps_deploy_error() {
        let (_dir, config) = project();
        let cloud = Arc::new(
            InMemoryCloud::signed_in(sample_identity("sub-1"))
                .with_group("rg-aifoundry-dev", "eastus")
                .with_deployment_failure("QuotaExceeded: not enough TPM quota"),
        );

        let mut out = Vec::new();
        let err = execute(
            &DeployArgs::default(),
            &config,
            Providers::in_memory(cloud.clone()),
            None,
            &mut out,
        )
        .await
        .unwrap_err();

        let deploy_err = err.downcast_ref::<DeployError>().unwrap();
        assert_eq!(deploy_err.exit_code(), 1);
        assert!(err.to_string().contains("QuotaExceeded: not enough TPM quota"));
        assert!(out.is_empty());
        assert!(!cloud.calls().contains(&Call::CreateGroup {
            name: "rg-aifoundry-dev".into(),
            location: "eastus".into()
        }));
    }
}
