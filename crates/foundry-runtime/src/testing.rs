//! In-memory provider for tests.
//!
//! [`InMemoryCloud`] implements every provider port, keeps resource groups and
//! role assignments in memory, and records each call so tests can assert on
//! ordering and on the absence of mutating calls.

use crate::provider::{DeploymentApi, ResourceGroupApi, SessionProvider};
use async_trait::async_trait;
use foundry_core::{
    DeploymentOutputs, DeploymentRequest, DeploymentResult, GroupRef, Identity, ProviderError,
    RoleAssignment, Scope, SessionContext, WhatIfReport,
};
use foundry_policy::{ASSIGNMENT_EXISTS_CODE, RoleAssignmentApi};
use std::sync::Mutex;

/// A provider call, as seen by [`InMemoryCloud`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentIdentity,
    Login,
    SetSubscription(String),
    GetGroup(String),
    CreateGroup { name: String, location: String },
    Submit { group: String, name: String },
    WhatIf { group: String },
    ListAssignments { principal: String, scope: String },
    CreateAssignment { principal: String, role: String, scope: String },
}

impl Call {
    /// True for calls that change provider state.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Call::CreateGroup { .. } | Call::Submit { .. } | Call::CreateAssignment { .. }
        )
    }
}

/// An identity on subscription `subscription_id`.
pub fn sample_identity(subscription_id: &str) -> Identity {
    Identity {
        user: "dev@example.com".to_string(),
        user_type: "user".to_string(),
        subscription_id: subscription_id.to_string(),
        subscription_name: format!("{subscription_id} name"),
        tenant_id: "00000000-0000-0000-0000-0000000000aa".to_string(),
    }
}

struct State {
    identity: Option<Identity>,
    login_as: Option<Identity>,
    subscriptions: Vec<(String, String)>,
    groups: Vec<GroupRef>,
    group_create_error: Option<ProviderError>,
    deployment: Result<DeploymentResult, ProviderError>,
    what_if: WhatIfReport,
    assignments: Vec<RoleAssignment>,
    unknown_principals: Vec<String>,
    calls: Vec<Call>,
}

/// In-memory cloud provider.
pub struct InMemoryCloud {
    state: Mutex<State>,
}

impl InMemoryCloud {
    fn with_identity(identity: Option<Identity>) -> Self {
        let subscriptions = identity
            .iter()
            .map(|i| (i.subscription_id.clone(), i.subscription_name.clone()))
            .collect();
        Self {
            state: Mutex::new(State {
                identity,
                login_as: None,
                subscriptions,
                groups: Vec::new(),
                group_create_error: None,
                deployment: Ok(DeploymentResult::succeeded(DeploymentOutputs::new())),
                what_if: WhatIfReport::default(),
                assignments: Vec::new(),
                unknown_principals: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self::with_identity(Some(identity))
    }

    /// Nobody is signed in. Login is aborted unless [`with_login`](Self::with_login) is used.
    pub fn signed_out() -> Self {
        Self::with_identity(None)
    }

    /// Login succeeds as `identity`.
    pub fn with_login(self, identity: Identity) -> Self {
        {
            let mut state = self.lock();
            state
                .subscriptions
                .push((identity.subscription_id.clone(), identity.subscription_name.clone()));
            state.login_as = Some(identity);
        }
        self
    }

    /// Another subscription the identity can switch to.
    pub fn with_subscription(self, id: &str, name: &str) -> Self {
        self.lock()
            .subscriptions
            .push((id.to_string(), name.to_string()));
        self
    }

    pub fn with_group(self, name: &str, location: &str) -> Self {
        {
            let mut state = self.lock();
            let subscription = state
                .identity
                .as_ref()
                .map(|i| i.subscription_id.clone())
                .unwrap_or_default();
            state.groups.push(GroupRef {
                id: Scope::resource_group(&subscription, name).to_string(),
                name: name.to_string(),
                location: location.to_string(),
            });
        }
        self
    }

    pub fn with_group_create_error(self, err: ProviderError) -> Self {
        self.lock().group_create_error = Some(err);
        self
    }

    /// Deployments succeed with `outputs`.
    pub fn with_deployment_outputs(self, outputs: DeploymentOutputs) -> Self {
        self.lock().deployment = Ok(DeploymentResult::succeeded(outputs));
        self
    }

    /// Deployments reach a terminal failed state with `message`.
    pub fn with_deployment_failure(self, message: &str) -> Self {
        self.lock().deployment = Ok(DeploymentResult::failed(message));
        self
    }

    /// Deployment submission itself is rejected.
    pub fn with_deployment_error(self, err: ProviderError) -> Self {
        self.lock().deployment = Err(err);
        self
    }

    pub fn with_what_if(self, report: WhatIfReport) -> Self {
        self.lock().what_if = report;
        self
    }

    pub fn with_assignment(self, principal: &str, role: &str, scope: &Scope) -> Self {
        self.lock()
            .assignments
            .push(RoleAssignment::new(principal, role, scope.clone()));
        self
    }

    /// Listing assignments for `principal` fails as if it did not exist.
    pub fn with_unknown_principal(self, principal: &str) -> Self {
        self.lock().unknown_principals.push(principal.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutating())
            .cloned()
            .collect()
    }

    pub fn groups(&self) -> Vec<GroupRef> {
        self.lock().groups.clone()
    }

    pub fn assignments(&self) -> Vec<RoleAssignment> {
        self.lock().assignments.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded calls from others.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl SessionProvider for InMemoryCloud {
    async fn current_identity(&self) -> Result<Option<Identity>, ProviderError> {
        self.record(Call::CurrentIdentity);
        Ok(self.lock().identity.clone())
    }

    async fn login(&self) -> Result<(), ProviderError> {
        self.record(Call::Login);
        let mut state = self.lock();
        match state.login_as.clone() {
            Some(identity) => {
                state.identity = Some(identity);
                Ok(())
            }
            None => Err(ProviderError::new("User cancelled the login flow.")),
        }
    }

    async fn set_subscription(&self, subscription: &str) -> Result<(), ProviderError> {
        self.record(Call::SetSubscription(subscription.to_string()));
        let mut state = self.lock();
        let found = state
            .subscriptions
            .iter()
            .find(|(id, name)| {
                id.eq_ignore_ascii_case(subscription) || name.eq_ignore_ascii_case(subscription)
            })
            .cloned();
        match (found, state.identity.as_mut()) {
            (Some((id, name)), Some(identity)) => {
                identity.subscription_id = id;
                identity.subscription_name = name;
                Ok(())
            }
            _ => Err(ProviderError::new(format!(
                "The subscription of '{subscription}' doesn't exist in cloud 'AzureCloud'."
            ))),
        }
    }
}

#[async_trait]
impl ResourceGroupApi for InMemoryCloud {
    async fn get(
        &self,
        _ctx: &SessionContext,
        name: &str,
    ) -> Result<Option<GroupRef>, ProviderError> {
        self.record(Call::GetGroup(name.to_string()));
        Ok(self
            .lock()
            .groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn create(
        &self,
        ctx: &SessionContext,
        name: &str,
        location: &str,
    ) -> Result<GroupRef, ProviderError> {
        self.record(Call::CreateGroup {
            name: name.to_string(),
            location: location.to_string(),
        });
        let mut state = self.lock();
        if let Some(err) = &state.group_create_error {
            return Err(err.clone());
        }
        let group = GroupRef {
            id: Scope::resource_group(ctx.subscription_id(), name).to_string(),
            name: name.to_string(),
            location: location.to_string(),
        };
        state.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl DeploymentApi for InMemoryCloud {
    async fn submit(
        &self,
        _ctx: &SessionContext,
        group: &GroupRef,
        name: &str,
        _request: &DeploymentRequest,
    ) -> Result<DeploymentResult, ProviderError> {
        self.record(Call::Submit {
            group: group.name.clone(),
            name: name.to_string(),
        });
        self.lock().deployment.clone()
    }

    async fn what_if(
        &self,
        _ctx: &SessionContext,
        group: &GroupRef,
        _request: &DeploymentRequest,
    ) -> Result<WhatIfReport, ProviderError> {
        self.record(Call::WhatIf {
            group: group.name.clone(),
        });
        Ok(self.lock().what_if.clone())
    }
}

#[async_trait]
impl RoleAssignmentApi for InMemoryCloud {
    async fn list(
        &self,
        _ctx: &SessionContext,
        principal: &str,
        scope: &Scope,
    ) -> Result<Vec<RoleAssignment>, ProviderError> {
        self.record(Call::ListAssignments {
            principal: principal.to_string(),
            scope: scope.to_string(),
        });
        let state = self.lock();
        if state.unknown_principals.iter().any(|p| p == principal) {
            return Err(ProviderError::new(format!(
                "Cannot find user or service principal in graph database for '{principal}'."
            )));
        }
        // Assignments at a parent scope are inherited.
        Ok(state
            .assignments
            .iter()
            .filter(|a| a.principal == principal && a.scope.encloses(scope))
            .cloned()
            .collect())
    }

    async fn create(
        &self,
        _ctx: &SessionContext,
        principal: &str,
        role: &str,
        scope: &Scope,
    ) -> Result<RoleAssignment, ProviderError> {
        self.record(Call::CreateAssignment {
            principal: principal.to_string(),
            role: role.to_string(),
            scope: scope.to_string(),
        });
        let mut state = self.lock();
        if state
            .assignments
            .iter()
            .any(|a| a.principal == principal && a.grants(role) && &a.scope == scope)
        {
            return Err(ProviderError::with_code(
                ASSIGNMENT_EXISTS_CODE,
                "ERROR: (RoleAssignmentExists) The role assignment already exists.",
            ));
        }
        let mut assignment = RoleAssignment::new(principal, role, scope.clone());
        assignment.id = Some(format!(
            "{scope}/providers/Microsoft.Authorization/roleAssignments/{}",
            state.assignments.len() + 1
        ));
        state.assignments.push(assignment.clone());
        Ok(assignment)
    }
}
