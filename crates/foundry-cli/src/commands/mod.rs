//! Command implementations for foundry-deploy.

pub mod deploy;
pub mod permissions;

use foundry_adapter_az::AzCli;
use foundry_policy::RoleAssignmentApi;
use foundry_runtime::{DeploymentApi, ResourceGroupApi, SessionProvider};
use std::sync::Arc;

/// The provider ports a command talks to.
#[derive(Clone)]
pub struct Providers {
    pub session: Arc<dyn SessionProvider>,
    pub groups: Arc<dyn ResourceGroupApi>,
    pub deployments: Arc<dyn DeploymentApi>,
    pub roles: Arc<dyn RoleAssignmentApi>,
}

impl Providers {
    /// Every port backed by the Azure CLI at `cli_path`.
    pub fn az(cli_path: &str) -> Self {
        let az = Arc::new(AzCli::new(cli_path));
        Self {
            session: az.clone(),
            groups: az.clone(),
            deployments: az.clone(),
            roles: az,
        }
    }

    #[cfg(test)]
    pub fn in_memory(cloud: Arc<foundry_runtime::testing::InMemoryCloud>) -> Self {
        Self {
            session: cloud.clone(),
            groups: cloud.clone(),
            deployments: cloud.clone(),
            roles: cloud,
        }
    }
}
