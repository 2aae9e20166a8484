//! Collaborator ports implemented by cloud provider adapters.
//!
//! Every call except the session calls receives the resolved
//! [`SessionContext`], so adapters never depend on whatever account or
//! subscription happens to be active in the provider's own tooling.

use async_trait::async_trait;
use foundry_core::{
    DeploymentRequest, DeploymentResult, GroupRef, Identity, ProviderError, SessionContext,
    WhatIfReport,
};

/// Cloud identity and session API.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The active identity, or `None` when nobody is signed in.
    async fn current_identity(&self) -> Result<Option<Identity>, ProviderError>;

    /// Interactive login. Blocks until the user completes or aborts it.
    async fn login(&self) -> Result<(), ProviderError>;

    /// Make `subscription` (id or name) the active subscription.
    async fn set_subscription(&self, subscription: &str) -> Result<(), ProviderError>;
}

/// Resource group API.
#[async_trait]
pub trait ResourceGroupApi: Send + Sync {
    /// Look a group up by name. Names are case-insensitive.
    async fn get(&self, ctx: &SessionContext, name: &str)
    -> Result<Option<GroupRef>, ProviderError>;

    async fn create(
        &self,
        ctx: &SessionContext,
        name: &str,
        location: &str,
    ) -> Result<GroupRef, ProviderError>;
}

/// Template deployment API.
///
/// `submit` blocks until the provider reports a terminal state. There is no
/// client-side timeout and no cancellation: once submitted, the provider
/// keeps running the deployment even if this process goes away. A polling
/// implementation can replace this one without changing callers.
#[async_trait]
pub trait DeploymentApi: Send + Sync {
    async fn submit(
        &self,
        ctx: &SessionContext,
        group: &GroupRef,
        name: &str,
        request: &DeploymentRequest,
    ) -> Result<DeploymentResult, ProviderError>;

    /// Predict the changes `request` would make, without deploying.
    async fn what_if(
        &self,
        ctx: &SessionContext,
        group: &GroupRef,
        request: &DeploymentRequest,
    ) -> Result<WhatIfReport, ProviderError>;
}
