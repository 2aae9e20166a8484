use anyhow::Context;
use clap::{Parser, Subcommand};
use foundry_core::FoundryConfig;
use foundry_runtime::DeployError;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Providers;
use commands::deploy::{self, DeployArgs};
use commands::permissions::{self, PermissionsCommand};

#[derive(Parser, Debug)]
#[command(
    name = "foundry-deploy",
    version,
    about = "Deploy an AI Foundry environment and audit its role assignments"
)]
struct Cli {
    /// Project configuration file (YAML). Defaults to ./foundry.yaml when present.
    #[arg(long, global = true, env = "FOUNDRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in if needed, ensure the resource group, deploy the template and report outputs.
    Deploy(DeployArgs),

    /// Audit or fix the role assignments a principal needs.
    Permissions {
        #[command(subcommand)]
        cmd: PermissionsCommand,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{}", render_error(&err));
            let code = err
                .downcast_ref::<DeployError>()
                .map_or(1, DeployError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// One line with the error and each of its causes, outermost first.
fn render_error(err: &anyhow::Error) -> String {
    format!("✘ {err:#}")
}

/// Returns `Ok(false)` for runs that finished but should exit non-zero.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = FoundryConfig::load_or_default(cli.config.as_deref())
        .context("loading project configuration")?;
    let providers = Providers::az(&config.provider.cli_path);
    let mut stdout = io::stdout().lock();

    match cli.cmd {
        Command::Deploy(args) => {
            let summary = std::env::var_os(deploy::STEP_SUMMARY_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from);
            deploy::execute(&args, &config, providers, summary.as_deref(), &mut stdout).await?;
            Ok(true)
        }
        Command::Permissions { cmd } => match cmd {
            PermissionsCommand::Check(args) => {
                permissions::check(&args, &config, providers, &mut stdout).await
            }
            PermissionsCommand::Grant(args) => {
                permissions::grant(&args, &config, providers, &mut stdout).await?;
                Ok(true)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use foundry_core::ProviderError;
    use foundry_runtime::testing::{InMemoryCloud, sample_identity};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_deploy_flags() {
        let cli = Cli::try_parse_from([
            "foundry-deploy",
            "deploy",
            "--resource-group-name",
            "rg-prod",
            "--set",
            "modelName=gpt-4o",
            "--set",
            "capacity=5",
            "--what-if",
        ])
        .unwrap();

        let Command::Deploy(args) = cli.cmd else {
            panic!("expected deploy");
        };
        assert_eq!(args.resource_group_name.as_deref(), Some("rg-prod"));
        assert_eq!(args.set, vec!["modelName=gpt-4o", "capacity=5"]);
        assert!(args.what_if);
    }

    #[test]
    fn test_parse_permissions_check() {
        let cli = Cli::try_parse_from([
            "foundry-deploy",
            "permissions",
            "check",
            "--principal",
            "p-1",
            "--account",
            "aif-dev",
            "--role",
            "Azure AI User",
            "--role",
            "Reader",
            "--fail-on-missing",
        ])
        .unwrap();

        let Command::Permissions {
            cmd: PermissionsCommand::Check(args),
        } = cli.cmd
        else {
            panic!("expected permissions check");
        };
        assert_eq!(args.principal, "p-1");
        assert_eq!(args.target.account.as_deref(), Some("aif-dev"));
        assert_eq!(args.roles, vec!["Azure AI User", "Reader"]);
        assert!(args.fail_on_missing);
    }

    #[test]
    fn test_scope_and_account_conflict() {
        let result = Cli::try_parse_from([
            "foundry-deploy",
            "permissions",
            "check",
            "--principal",
            "p-1",
            "--scope",
            "/subscriptions/s",
            "--account",
            "aif-dev",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_grant_requires_role() {
        let result = Cli::try_parse_from([
            "foundry-deploy",
            "permissions",
            "grant",
            "--principal",
            "p-1",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_provisioning_error_renders_provider_text_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.bicep"), "").unwrap();
        std::fs::write(dir.path().join("main.parameters.json"), "{}").unwrap();
        let mut config = FoundryConfig::default();
        config.deploy.template_file = dir.path().join("main.bicep");
        config.deploy.parameters_file = dir.path().join("main.parameters.json");

        let denied = ProviderError::from_cli_stderr(
            "ERROR: (RequestDisallowedByPolicy) disallowed by policy.",
        );
        let cloud = Arc::new(
            InMemoryCloud::signed_in(sample_identity("sub-1")).with_group_create_error(denied),
        );

        let err = deploy::execute(
            &DeployArgs::default(),
            &config,
            Providers::in_memory(cloud),
            None,
            &mut Vec::new(),
        )
        .await
        .unwrap_err();

        let rendered = render_error(&err);
        assert_eq!(
            rendered,
            "✘ failed to provision resource group 'rg-aifoundry-dev': \
             ERROR: (RequestDisallowedByPolicy) disallowed by policy."
        );
        assert_eq!(rendered.matches("RequestDisallowedByPolicy").count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_renders_provider_text_once() {
        let cloud = Arc::new(
            InMemoryCloud::signed_in(sample_identity("sub-1")).with_unknown_principal("ghost"),
        );
        let args = permissions::CheckArgs {
            principal: "ghost".into(),
            target: permissions::TargetArgs {
                account: Some("aif-dev".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = permissions::check(
            &args,
            &FoundryConfig::default(),
            Providers::in_memory(cloud),
            &mut Vec::new(),
        )
        .await
        .unwrap_err();

        let rendered = render_error(&err);
        assert!(rendered.starts_with(
            "✘ could not look up role assignments for principal 'ghost' at scope \
             '/subscriptions/sub-1/resourceGroups/rg-aifoundry-dev/"
        ));
        assert_eq!(rendered.matches("Cannot find user or service principal").count(), 1);
    }
}
