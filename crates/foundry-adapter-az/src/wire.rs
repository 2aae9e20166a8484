//! JSON shapes printed by `az ... -o json`. Only the fields we read.

use foundry_core::{DeploymentOutputs, DeploymentResult, GroupRef, Identity, RoleAssignment, Scope};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountShow {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tenant_id: String,
    pub user: AccountUser,
}

#[derive(Debug, Deserialize)]
pub struct AccountUser {
    pub name: String,
    #[serde(rename = "type", default)]
    pub user_type: String,
}

impl From<AccountShow> for Identity {
    fn from(a: AccountShow) -> Self {
        Identity {
            user: a.user.name,
            user_type: a.user.user_type,
            subscription_id: a.id,
            subscription_name: a.name,
            tenant_id: a.tenant_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GroupShow {
    pub id: String,
    pub name: String,
    pub location: String,
}

impl From<GroupShow> for GroupRef {
    fn from(g: GroupShow) -> Self {
        GroupRef {
            id: g.id,
            name: g.name,
            location: g.location,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeploymentShow {
    pub properties: DeploymentProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    pub provisioning_state: String,
    #[serde(default)]
    pub outputs: Option<DeploymentOutputs>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl DeploymentShow {
    /// Map to a terminal result. Any state other than `Succeeded` is a failure
    /// carrying the provider's error body verbatim, as JSON text.
    pub fn into_result(self) -> DeploymentResult {
        let props = self.properties;
        if props.provisioning_state.eq_ignore_ascii_case("Succeeded") {
            return DeploymentResult::succeeded(props.outputs.unwrap_or_default());
        }
        let message = match props.error {
            Some(err) => err.to_string(),
            None => format!("deployment ended in state '{}'", props.provisioning_state),
        };
        DeploymentResult::failed(message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    #[serde(default)]
    pub id: Option<String>,
    pub principal_id: String,
    pub role_definition_name: String,
    pub scope: String,
}

impl From<AssignmentRow> for RoleAssignment {
    fn from(row: AssignmentRow) -> Self {
        RoleAssignment {
            id: row.id,
            principal: row.principal_id,
            role: row.role_definition_name,
            scope: Scope::new(row.scope),
        }
    }
}
