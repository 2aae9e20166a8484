//! Azure CLI adapter.
//!
//! [`AzCli`] implements the provider ports of `foundry-runtime` and
//! `foundry-policy` by shelling out to `az` with `-o json` and parsing its
//! output. Errors keep the CLI's stderr text verbatim; the `(Code)` prefix az
//! prints is lifted into [`ProviderError::code`].
//!
//! Every call after session resolution passes `--subscription` explicitly,
//! taken from the [`SessionContext`], rather than trusting the CLI's active
//! account.

use async_trait::async_trait;
use foundry_core::{
    DeploymentRequest, DeploymentResult, GroupRef, Identity, ProviderError, RoleAssignment, Scope,
    SessionContext, WhatIfReport,
};
use foundry_policy::RoleAssignmentApi;
use foundry_runtime::{DeploymentApi, ResourceGroupApi, SessionProvider};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub mod runner;
pub mod wire;

pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

/// Provider code for a resource group lookup miss.
const GROUP_NOT_FOUND_CODE: &str = "ResourceGroupNotFound";

/// Azure CLI backed provider.
pub struct AzCli {
    runner: Arc<dyn CommandRunner>,
}

impl AzCli {
    /// Use the `az` binary at `program` (a name on `PATH` or a full path).
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_runner(Arc::new(ProcessRunner::new(program)))
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn run(&self, args: Vec<String>) -> Result<CommandOutput, ProviderError> {
        self.runner.output(&args).await
    }

    /// Run and parse stdout as JSON; a failed command becomes its stderr.
    async fn run_json<T: DeserializeOwned>(&self, args: Vec<String>) -> Result<T, ProviderError> {
        let out = self.run(args).await?;
        if !out.success {
            return Err(ProviderError::from_cli_stderr(&out.stderr));
        }
        parse_json(&out.stdout)
    }
}

fn parse_json<T: DeserializeOwned>(stdout: &str) -> Result<T, ProviderError> {
    serde_json::from_str(stdout)
        .map_err(|e| ProviderError::new(format!("unexpected az output: {e}")))
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `--template-file` and `--parameters` arguments shared by create and what-if.
fn template_args(request: &DeploymentRequest) -> Vec<String> {
    let mut out = vec![
        "--template-file".to_string(),
        request.template_file.to_string_lossy().into_owned(),
    ];
    if let Some(params) = &request.parameters_file {
        out.push("--parameters".to_string());
        out.push(format!("@{}", params.to_string_lossy()));
    }
    for (key, value) in &request.parameter_overrides {
        out.push("--parameters".to_string());
        out.push(format!("{key}={value}"));
    }
    out
}

// az prints this hint when no account is signed in.
fn is_signed_out(stderr: &str) -> bool {
    stderr.contains("az login")
}

#[async_trait]
impl SessionProvider for AzCli {
    async fn current_identity(&self) -> Result<Option<Identity>, ProviderError> {
        let out = self.run(args(["account", "show", "-o", "json"])).await?;
        if !out.success {
            if is_signed_out(&out.stderr) {
                return Ok(None);
            }
            return Err(ProviderError::from_cli_stderr(&out.stderr));
        }
        let account: wire::AccountShow = parse_json(&out.stdout)?;
        Ok(Some(account.into()))
    }

    async fn login(&self) -> Result<(), ProviderError> {
        self.runner.interactive(&args(["login"])).await
    }

    async fn set_subscription(&self, subscription: &str) -> Result<(), ProviderError> {
        let out = self
            .run(args(["account", "set", "--subscription", subscription]))
            .await?;
        if out.success {
            Ok(())
        } else {
            Err(ProviderError::from_cli_stderr(&out.stderr))
        }
    }
}

#[async_trait]
impl ResourceGroupApi for AzCli {
    async fn get(
        &self,
        ctx: &SessionContext,
        name: &str,
    ) -> Result<Option<GroupRef>, ProviderError> {
        let result: Result<wire::GroupShow, _> = self
            .run_json(args([
                "group",
                "show",
                "--name",
                name,
                "--subscription",
                ctx.subscription_id(),
                "-o",
                "json",
            ]))
            .await;
        match result {
            Ok(group) => Ok(Some(group.into())),
            Err(e) if e.has_code(GROUP_NOT_FOUND_CODE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(
        &self,
        ctx: &SessionContext,
        name: &str,
        location: &str,
    ) -> Result<GroupRef, ProviderError> {
        let group: wire::GroupShow = self
            .run_json(args([
                "group",
                "create",
                "--name",
                name,
                "--location",
                location,
                "--subscription",
                ctx.subscription_id(),
                "-o",
                "json",
            ]))
            .await?;
        Ok(group.into())
    }
}

#[async_trait]
impl DeploymentApi for AzCli {
    async fn submit(
        &self,
        ctx: &SessionContext,
        group: &GroupRef,
        name: &str,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, ProviderError> {
        let mut cmd = args([
            "deployment",
            "group",
            "create",
            "--resource-group",
            group.name.as_str(),
            "--name",
            name,
            "--subscription",
            ctx.subscription_id(),
        ]);
        cmd.extend(template_args(request));
        cmd.extend(args(["-o", "json"]));

        let show: wire::DeploymentShow = self.run_json(cmd).await?;
        Ok(show.into_result())
    }

    async fn what_if(
        &self,
        ctx: &SessionContext,
        group: &GroupRef,
        request: &DeploymentRequest,
    ) -> Result<WhatIfReport, ProviderError> {
        let mut cmd = args([
            "deployment",
            "group",
            "what-if",
            "--resource-group",
            group.name.as_str(),
            "--subscription",
            ctx.subscription_id(),
        ]);
        cmd.extend(template_args(request));
        cmd.extend(args(["--no-pretty-print", "-o", "json"]));

        self.run_json(cmd).await
    }
}

#[async_trait]
impl RoleAssignmentApi for AzCli {
    async fn list(
        &self,
        ctx: &SessionContext,
        principal: &str,
        scope: &Scope,
    ) -> Result<Vec<RoleAssignment>, ProviderError> {
        let rows: Vec<wire::AssignmentRow> = self
            .run_json(args([
                "role",
                "assignment",
                "list",
                "--assignee",
                principal,
                "--scope",
                scope.as_str(),
                "--include-inherited",
                "--subscription",
                ctx.subscription_id(),
                "-o",
                "json",
            ]))
            .await?;
        Ok(rows.into_iter().map(RoleAssignment::from).collect())
    }

    async fn create(
        &self,
        ctx: &SessionContext,
        principal: &str,
        role: &str,
        scope: &Scope,
    ) -> Result<RoleAssignment, ProviderError> {
        let row: wire::AssignmentRow = self
            .run_json(args([
                "role",
                "assignment",
                "create",
                "--assignee",
                principal,
                "--role",
                role,
                "--scope",
                scope.as_str(),
                "--subscription",
                ctx.subscription_id(),
                "-o",
                "json",
            ]))
            .await?;
        Ok(row.into())
    }
}
