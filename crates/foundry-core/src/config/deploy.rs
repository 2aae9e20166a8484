//! Deployment defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const DEFAULT_RESOURCE_GROUP: &str = "rg-aifoundry-dev";
pub const DEFAULT_LOCATION: &str = "eastus";
pub const DEFAULT_TEMPLATE_FILE: &str = "main.bicep";
pub const DEFAULT_PARAMETERS_FILE: &str = "main.parameters.json";
pub const DEFAULT_DEPLOYMENT_PREFIX: &str = "aifoundry-deployment";

/// Configuration for the deploy pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    /// Target resource group, created if it does not exist.
    #[serde(default = "default_resource_group")]
    pub resource_group_name: String,

    /// Region used when the resource group has to be created.
    #[serde(default = "default_location")]
    pub location: String,

    /// Subscription to switch to before deploying.
    #[serde(default)]
    pub subscription_id: Option<String>,

    /// Declarative template handed to the provider.
    #[serde(default = "default_template_file")]
    pub template_file: PathBuf,

    /// Parameter set for the template.
    #[serde(default = "default_parameters_file")]
    pub parameters_file: PathBuf,

    /// Inline parameter overrides applied after the parameters file.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,

    /// Prefix for synthesised deployment names.
    #[serde(default = "default_deployment_prefix")]
    pub deployment_prefix: String,

    /// Where to write deployment outputs as JSON.
    #[serde(default)]
    pub outputs_file: Option<PathBuf>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            resource_group_name: default_resource_group(),
            location: default_location(),
            subscription_id: None,
            template_file: default_template_file(),
            parameters_file: default_parameters_file(),
            parameters: BTreeMap::new(),
            deployment_prefix: default_deployment_prefix(),
            outputs_file: None,
        }
    }
}

fn default_resource_group() -> String {
    DEFAULT_RESOURCE_GROUP.to_string()
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_template_file() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPLATE_FILE)
}

fn default_parameters_file() -> PathBuf {
    PathBuf::from(DEFAULT_PARAMETERS_FILE)
}

fn default_deployment_prefix() -> String {
    DEFAULT_DEPLOYMENT_PREFIX.to_string()
}
