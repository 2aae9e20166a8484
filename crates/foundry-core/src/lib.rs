use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

// Configuration types shared across all foundry crates
pub mod config;
pub mod error;

pub use config::{DeployConfig, FoundryConfig, PermissionsConfig, ProviderConfig};
pub use error::{ConfigError, ProviderError, RequestError};

/// Maximum length the provider accepts for a deployment name.
pub const MAX_DEPLOYMENT_NAME_LEN: usize = 64;

// ============================================================================
// Session
// ============================================================================

/// The signed-in account as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User or service principal name.
    pub user: String,
    /// "user" or "servicePrincipal".
    pub user_type: String,
    pub subscription_id: String,
    pub subscription_name: String,
    pub tenant_id: String,
}

impl Identity {
    /// True when `subscription` names the active subscription, by id or display name.
    pub fn is_on_subscription(&self, subscription: &str) -> bool {
        self.subscription_id.eq_ignore_ascii_case(subscription)
            || self.subscription_name.eq_ignore_ascii_case(subscription)
    }
}

/// A resolved session. Every provider call receives this explicitly
/// instead of relying on whatever context the provider CLI has active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub identity: Identity,
}

impl SessionContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn subscription_id(&self) -> &str {
        &self.identity.subscription_id
    }
}

// ============================================================================
// Resource groups and scopes
// ============================================================================

/// Reference to an existing resource group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
    pub location: String,
}

/// The resource or container a role assignment applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn subscription(subscription_id: &str) -> Self {
        Self(format!("/subscriptions/{subscription_id}"))
    }

    pub fn resource_group(subscription_id: &str, group: &str) -> Self {
        Self(format!("/subscriptions/{subscription_id}/resourceGroups/{group}"))
    }

    /// Scope of an AI services (Cognitive Services) account.
    pub fn ai_account(subscription_id: &str, group: &str, account: &str) -> Self {
        Self(format!(
            "/subscriptions/{subscription_id}/resourceGroups/{group}/providers/Microsoft.CognitiveServices/accounts/{account}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `other` is this scope or lies beneath it, splitting only at
    /// `/`. Resource ids compare case-insensitively.
    pub fn encloses(&self, other: &Scope) -> bool {
        let parent = self.0.trim_end_matches('/');
        match other.0.get(..parent.len()) {
            Some(head) if head.eq_ignore_ascii_case(parent) => {
                matches!(other.0.as_bytes().get(parent.len()), None | Some(b'/'))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Role assignments
// ============================================================================

/// A grant of a named role to a principal at a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Provider id of the assignment, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub principal: String,
    pub role: String,
    pub scope: Scope,
}

impl RoleAssignment {
    pub fn new(principal: impl Into<String>, role: impl Into<String>, scope: Scope) -> Self {
        Self {
            id: None,
            principal: principal.into(),
            role: role.into(),
            scope,
        }
    }

    /// Role names are matched case-insensitively, as the provider does.
    pub fn grants(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }
}

/// Roles a principal must hold at a scope.
///
/// Names are trimmed and de-duplicated case-insensitively; the first spelling wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PermissionRequirement {
    roles: Vec<String>,
}

impl PermissionRequirement {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for role in roles {
            let role: String = role.into();
            let role = role.trim();
            if role.is_empty() || out.iter().any(|r| r.eq_ignore_ascii_case(role)) {
                continue;
            }
            out.push(role.to_string());
        }
        Self { roles: out }
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Combine two requirements, keeping order and dropping duplicates.
    pub fn merged(&self, other: &PermissionRequirement) -> Self {
        Self::new(self.roles.iter().chain(other.roles.iter()).cloned())
    }
}

impl From<Vec<String>> for PermissionRequirement {
    fn from(roles: Vec<String>) -> Self {
        Self::new(roles)
    }
}

impl From<PermissionRequirement> for Vec<String> {
    fn from(req: PermissionRequirement) -> Self {
        req.roles
    }
}

// ============================================================================
// Deployments
// ============================================================================

/// One template submission, built from CLI flags and config at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub template_file: PathBuf,
    pub parameters_file: Option<PathBuf>,
    /// Inline `key=value` overrides applied after the parameters file.
    pub parameter_overrides: Vec<(String, String)>,
    pub resource_group: String,
    pub location: String,
    pub subscription: Option<String>,
    /// Explicit deployment name; synthesised from `name_prefix` when absent.
    pub deployment_name: Option<String>,
    pub name_prefix: String,
}

impl DeploymentRequest {
    /// Check the request before anything is sent to the provider.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.resource_group.trim().is_empty() {
            return Err(RequestError::EmptyResourceGroup);
        }
        if !self.template_file.is_file() {
            return Err(RequestError::TemplateNotFound(self.template_file.clone()));
        }
        if let Some(params) = &self.parameters_file
            && !params.is_file()
        {
            return Err(RequestError::ParametersNotFound(params.clone()));
        }
        if let Some(name) = &self.deployment_name {
            validate_deployment_name(name)?;
        }
        Ok(())
    }
}

/// Parse a `key=value` parameter override.
pub fn parse_parameter_override(raw: &str) -> Result<(String, String), RequestError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(RequestError::InvalidParameterOverride(raw.to_string())),
    }
}

/// Provider naming rules: 1-64 characters of `[A-Za-z0-9-_.()]`.
pub fn validate_deployment_name(name: &str) -> Result<(), RequestError> {
    let invalid = |reason: &str| RequestError::InvalidDeploymentName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_DEPLOYMENT_NAME_LEN {
        return Err(invalid("name must be at most 64 characters"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')')))
    {
        return Err(invalid(&format!("character '{c}' is not allowed")));
    }
    Ok(())
}

/// Terminal state of a deployment as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeploymentStatus {
    Succeeded,
    Failed { message: String },
}

/// A single deployment output, in the provider's `{type, value}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputValue {
    #[serde(rename = "type", default)]
    pub output_type: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl OutputValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            output_type: "String".to_string(),
            value: serde_json::Value::String(value.into()),
        }
    }
}

/// Deployment outputs in the order the provider returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentOutputs(Vec<(String, OutputValue)>);

impl DeploymentOutputs {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace an output, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: OutputValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutputValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, OutputValue)> for DeploymentOutputs {
    fn from_iter<T: IntoIterator<Item = (K, OutputValue)>>(iter: T) -> Self {
        let mut outputs = DeploymentOutputs::new();
        for (k, v) in iter {
            outputs.insert(k, v);
        }
        outputs
    }
}

impl Serialize for DeploymentOutputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DeploymentOutputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's preserve_order keeps the provider's key order here.
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        map.into_iter()
            .map(|(k, v)| {
                serde_json::from_value::<OutputValue>(v)
                    .map(|v| (k, v))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

/// Result of a completed deployment. Read-only to this tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    #[serde(flatten)]
    pub status: DeploymentStatus,
    #[serde(default)]
    pub outputs: DeploymentOutputs,
}

impl DeploymentResult {
    pub fn succeeded(outputs: DeploymentOutputs) -> Self {
        Self {
            status: DeploymentStatus::Succeeded,
            outputs,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: DeploymentStatus::Failed {
                message: message.into(),
            },
            outputs: DeploymentOutputs::new(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.status, DeploymentStatus::Succeeded)
    }
}

// ============================================================================
// What-if preview
// ============================================================================

/// Kind of change a what-if preview predicts for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Create,
    Delete,
    Modify,
    Deploy,
    NoChange,
    Ignore,
    Unsupported,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Create => "create",
            ChangeType::Delete => "delete",
            ChangeType::Modify => "modify",
            ChangeType::Deploy => "deploy",
            ChangeType::NoChange => "no change",
            ChangeType::Ignore => "ignore",
            ChangeType::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChange {
    pub change_type: ChangeType,
    pub resource_id: String,
}

/// Predicted changes for a deployment that has not been submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhatIfReport {
    #[serde(default)]
    pub changes: Vec<ResourceChange>,
}

impl WhatIfReport {
    pub fn count(&self, change_type: ChangeType) -> usize {
        self.changes
            .iter()
            .filter(|c| c.change_type == change_type)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requirement_deduplicates_case_insensitively() {
        let req = PermissionRequirement::new(["Azure AI User", " azure ai user ", "", "Reader"]);
        assert_eq!(req.roles(), &["Azure AI User".to_string(), "Reader".to_string()]);
    }

    #[test]
    fn test_requirement_merge_keeps_order() {
        let a = PermissionRequirement::new(["Azure AI User"]);
        let b = PermissionRequirement::new(["Reader", "AZURE AI USER"]);
        assert_eq!(a.merged(&b).roles(), &["Azure AI User".to_string(), "Reader".to_string()]);
    }

    #[test]
    fn test_scope_builders() {
        assert_eq!(Scope::subscription("s1").as_str(), "/subscriptions/s1");
        assert_eq!(
            Scope::ai_account("s1", "rg", "acct").to_string(),
            "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.CognitiveServices/accounts/acct"
        );
    }

    #[test]
    fn test_scope_encloses_only_at_segment_boundary() {
        let group = Scope::resource_group("s1", "rg");
        assert!(Scope::subscription("s1").encloses(&group));
        assert!(group.encloses(&group));
        assert!(group.encloses(&Scope::ai_account("s1", "rg", "acct")));
        assert!(Scope::new("/subscriptions/S1/resourcegroups/RG/").encloses(&group));
        assert!(!group.encloses(&Scope::resource_group("s1", "rg-aifoundry-dev")));
        assert!(!group.encloses(&Scope::subscription("s1")));
        assert!(!Scope::subscription("s1").encloses(&Scope::subscription("s10")));
    }

    #[test]
    fn test_identity_matches_subscription_by_id_or_name() {
        let identity = Identity {
            user: "dev@example.com".into(),
            user_type: "user".into(),
            subscription_id: "AAAA-1111".into(),
            subscription_name: "Dev Sub".into(),
            tenant_id: "t".into(),
        };
        assert!(identity.is_on_subscription("aaaa-1111"));
        assert!(identity.is_on_subscription("dev sub"));
        assert!(!identity.is_on_subscription("BBBB-2222"));
    }

    #[test]
    fn test_deployment_name_rules() {
        assert!(validate_deployment_name("aifoundry-deployment-20240101-120000").is_ok());
        assert!(validate_deployment_name("a.b_c(1)").is_ok());
        assert!(validate_deployment_name("").is_err());
        assert!(validate_deployment_name("has space").is_err());
        assert!(validate_deployment_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_parameter_override_parsing() {
        assert_eq!(
            parse_parameter_override("location=westus=2").unwrap(),
            ("location".to_string(), "westus=2".to_string())
        );
        assert!(parse_parameter_override("noequals").is_err());
        assert!(parse_parameter_override("=value").is_err());
    }

    #[test]
    fn test_validate_reports_missing_template() {
        let request = DeploymentRequest {
            template_file: PathBuf::from("/definitely/not/here/main.bicep"),
            parameters_file: None,
            parameter_overrides: vec![],
            resource_group: "rg".into(),
            location: "eastus".into(),
            subscription: None,
            deployment_name: None,
            name_prefix: "p".into(),
        };
        assert_eq!(
            request.validate(),
            Err(RequestError::TemplateNotFound(PathBuf::from(
                "/definitely/not/here/main.bicep"
            )))
        );
    }

    #[test]
    fn test_validate_accepts_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("main.bicep");
        let params = dir.path().join("main.parameters.json");
        std::fs::write(&template, "param location string").unwrap();
        std::fs::write(&params, "{}").unwrap();

        let request = DeploymentRequest {
            template_file: template,
            parameters_file: Some(params.clone()),
            parameter_overrides: vec![],
            resource_group: "rg".into(),
            location: "eastus".into(),
            subscription: None,
            deployment_name: Some("bad name".into()),
            name_prefix: "p".into(),
        };
        assert!(matches!(
            request.validate(),
            Err(RequestError::InvalidDeploymentName { .. })
        ));

        let request = DeploymentRequest {
            deployment_name: None,
            ..request
        };
        assert_eq!(request.validate(), Ok(()));
    }

    #[test]
    fn test_outputs_keep_provider_order() {
        let raw = json!({
            "zeta": {"type": "String", "value": "z"},
            "alpha": {"type": "Int", "value": 1},
            "mid": {"type": "Object", "value": {"a": 1}}
        });
        let outputs: DeploymentOutputs = serde_json::from_value(raw).unwrap();
        let keys: Vec<_> = outputs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(outputs.get("alpha").unwrap().value, json!(1));
    }

    #[test]
    fn test_outputs_insert_replaces_in_place() {
        let mut outputs: DeploymentOutputs =
            [("a", OutputValue::string("1")), ("b", OutputValue::string("2"))]
                .into_iter()
                .collect();
        outputs.insert("a", OutputValue::string("3"));
        let pairs: Vec<_> = outputs.iter().map(|(k, v)| (k, v.value.clone())).collect();
        assert_eq!(pairs, vec![("a", json!("3")), ("b", json!("2"))]);
    }

    #[test]
    fn test_what_if_counts() {
        let report: WhatIfReport = serde_json::from_value(json!({
            "changes": [
                {"changeType": "Create", "resourceId": "/a"},
                {"changeType": "Create", "resourceId": "/b"},
                {"changeType": "NoChange", "resourceId": "/c"}
            ]
        }))
        .unwrap();
        assert_eq!(report.count(ChangeType::Create), 2);
        assert_eq!(report.count(ChangeType::NoChange), 1);
        assert_eq!(report.count(ChangeType::Delete), 0);
    }
}
