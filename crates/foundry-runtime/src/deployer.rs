//! Template deployer.

use crate::error::DeployError;
use crate::provider::DeploymentApi;
use chrono::{DateTime, Utc};
use foundry_core::{
    DeploymentRequest, DeploymentResult, DeploymentStatus, GroupRef, MAX_DEPLOYMENT_NAME_LEN,
    SessionContext, WhatIfReport, validate_deployment_name,
};
use std::time::Instant;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
// "-" plus "YYYYMMDD-HHMMSS"
const SUFFIX_LEN: usize = 16;

/// Synthesise a deployment name from `prefix` and `at`, to the second.
///
/// Overlong prefixes are truncated so the name stays within the provider's limit.
pub fn deployment_name(prefix: &str, at: DateTime<Utc>) -> String {
    let prefix = prefix.trim_end_matches('-');
    let max_prefix = MAX_DEPLOYMENT_NAME_LEN - SUFFIX_LEN;
    let prefix = match prefix.char_indices().nth(max_prefix) {
        Some((cut, _)) => &prefix[..cut],
        None => prefix,
    };
    format!("{prefix}-{}", at.format(TIMESTAMP_FORMAT))
}

/// Name to deploy under: the explicit one, or a synthesised one.
pub fn resolve_name(
    request: &DeploymentRequest,
    now: DateTime<Utc>,
) -> Result<String, DeployError> {
    let name = match &request.deployment_name {
        Some(name) => name.clone(),
        None => deployment_name(&request.name_prefix, now),
    };
    validate_deployment_name(&name)?;
    Ok(name)
}

/// Submit `request` to `group` and wait for the provider to finish.
///
/// A transport failure and a terminal failure status both become
/// [`DeployError::Deployment`] carrying the provider's text unchanged.
pub async fn deploy(
    ctx: &SessionContext,
    api: &dyn DeploymentApi,
    group: &GroupRef,
    name: &str,
    request: &DeploymentRequest,
) -> Result<DeploymentResult, DeployError> {
    tracing::info!(
        deployment = %name,
        group = %group.name,
        template = %request.template_file.display(),
        "Submitting deployment"
    );
    let started = Instant::now();

    let result = api
        .submit(ctx, group, name, request)
        .await
        .map_err(|e| DeployError::Deployment {
            name: name.to_string(),
            message: e.message,
        })?;

    let elapsed_secs = started.elapsed().as_secs();
    match &result.status {
        DeploymentStatus::Succeeded => {
            tracing::info!(
                deployment = %name,
                outputs = result.outputs.len(),
                elapsed_secs,
                "Deployment succeeded"
            );
            Ok(result)
        }
        DeploymentStatus::Failed { message } => {
            tracing::error!(deployment = %name, elapsed_secs, "Deployment failed");
            Err(DeployError::Deployment {
                name: name.to_string(),
                message: message.clone(),
            })
        }
    }
}

/// Ask the provider what `request` would change in `group`.
pub async fn preview(
    ctx: &SessionContext,
    api: &dyn DeploymentApi,
    group: &GroupRef,
    request: &DeploymentRequest,
) -> Result<WhatIfReport, DeployError> {
    tracing::info!(group = %group.name, "Requesting what-if preview");
    api.what_if(ctx, group, request)
        .await
        .map_err(|e| DeployError::Deployment {
            name: "what-if".to_string(),
            message: e.message,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn request(name: Option<&str>) -> DeploymentRequest {
        DeploymentRequest {
            template_file: PathBuf::from("main.bicep"),
            parameters_file: None,
            parameter_overrides: vec![],
            resource_group: "rg".into(),
            location: "eastus".into(),
            subscription: None,
            deployment_name: name.map(String::from),
            name_prefix: "aifoundry-deployment".into(),
        }
    }

    #[test]
    fn test_name_has_prefix_and_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            deployment_name("aifoundry-deployment", at),
            "aifoundry-deployment-20240309-070501"
        );
    }

    #[test]
    fn test_names_one_second_apart_differ() {
        let first = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let second = first + chrono::Duration::seconds(1);
        assert_ne!(
            deployment_name("aifoundry-deployment", first),
            deployment_name("aifoundry-deployment", second)
        );
    }

    #[test]
    fn test_long_prefix_is_truncated() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let name = deployment_name(&"p".repeat(100), at);
        assert_eq!(name.len(), MAX_DEPLOYMENT_NAME_LEN);
        assert!(name.ends_with("-20240101-000000"));
    }

    #[test]
    fn test_explicit_name_wins_and_is_validated() {
        let now = Utc::now();
        assert_eq!(resolve_name(&request(Some("release-1")), now).unwrap(), "release-1");
        assert!(matches!(
            resolve_name(&request(Some("bad name")), now),
            Err(DeployError::InvalidRequest(_))
        ));
        assert!(
            resolve_name(&request(None), now)
                .unwrap()
                .starts_with("aifoundry-deployment-")
        );
    }
}
