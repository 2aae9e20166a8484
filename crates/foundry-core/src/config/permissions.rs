//! Permission check defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role every principal using the platform needs.
pub const DEFAULT_REQUIRED_ROLE: &str = "Azure AI User";

/// Configuration for `permissions check` and `permissions grant`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Roles checked when no `--role` or `--preset` is given.
    #[serde(default = "default_required_roles")]
    pub required_roles: Vec<String>,

    /// Additional named role lists, alongside the built-in presets.
    #[serde(default)]
    pub presets: BTreeMap<String, Vec<String>>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            required_roles: default_required_roles(),
            presets: BTreeMap::new(),
        }
    }
}

fn default_required_roles() -> Vec<String> {
    vec![DEFAULT_REQUIRED_ROLE.to_string()]
}
