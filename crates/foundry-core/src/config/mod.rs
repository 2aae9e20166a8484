//! Configuration types for foundry-deploy.
//!
//! Configuration is read from an optional YAML project file (`foundry.yaml`)
//! and then overridden by command-line flags and environment variables.
//! Every field has a default, so an empty file (or no file) is valid.
//!
//! ```yaml
//! provider:
//!   cli_path: az
//! deploy:
//!   resource_group_name: rg-aifoundry-dev
//!   location: eastus
//!   template_file: infra/main.bicep
//!   parameters_file: infra/main.parameters.json
//!   parameters:
//!     modelName: gpt-4o
//! permissions:
//!   required_roles: ["Azure AI User"]
//!   presets:
//!     ops: ["Reader", "Azure AI User"]
//! ```

pub mod deploy;
pub mod permissions;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub use deploy::DeployConfig;
pub use permissions::PermissionsConfig;

/// Conventional project config file name.
pub const DEFAULT_CONFIG_FILE: &str = "foundry.yaml";

/// Complete configuration loaded from a project file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FoundryConfig {
    /// How the cloud provider is reached.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Defaults for `deploy`.
    #[serde(default)]
    pub deploy: DeployConfig,

    /// Defaults for `permissions`.
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

impl FoundryConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        config.resolve_relative_to(path.parent().unwrap_or_else(|| Path::new(".")))
    }

    /// Load `path` if given, else `foundry.yaml` in the working directory if
    /// present, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let conventional = Path::new(DEFAULT_CONFIG_FILE);
                if conventional.is_file() {
                    Self::load(conventional)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Parse configuration from YAML text. An empty document yields defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.cli_path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "provider.cli_path must not be empty".to_string(),
            ));
        }
        if self.deploy.deployment_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "deploy.deployment_prefix must not be empty".to_string(),
            ));
        }
        for (name, roles) in &self.permissions.presets {
            if roles.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "permissions.presets.{name} must list at least one role"
                )));
            }
        }
        Ok(())
    }

    /// Paths in a config file are relative to the file, not the working directory.
    fn resolve_relative_to(mut self, base: &Path) -> Result<Self, ConfigError> {
        let rebase = |p: &PathBuf| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.clone()
            }
        };
        self.deploy.template_file = rebase(&self.deploy.template_file);
        self.deploy.parameters_file = rebase(&self.deploy.parameters_file);
        self.deploy.outputs_file = self.deploy.outputs_file.as_ref().map(rebase);
        Ok(self)
    }
}

/// Cloud provider access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Path or name of the provider CLI executable.
    #[serde(default = "default_cli_path")]
    pub cli_path: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
        }
    }
}

fn default_cli_path() -> String {
    "az".to_string()
}
