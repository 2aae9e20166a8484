//! Cloud session resolution.

use crate::error::DeployError;
use crate::provider::SessionProvider;
use foundry_core::SessionContext;

/// Resolve the session for this run.
///
/// Logs in interactively when nobody is signed in, then switches to
/// `subscription` if it is given and not already active.
pub async fn ensure_session(
    provider: &dyn SessionProvider,
    subscription: Option<&str>,
) -> Result<SessionContext, DeployError> {
    let mut identity = match current(provider).await? {
        Some(identity) => identity,
        None => {
            tracing::info!("No active session, starting interactive login");
            provider
                .login()
                .await
                .map_err(|e| DeployError::authentication("login failed", Some(e)))?;
            current(provider).await?.ok_or_else(|| {
                DeployError::authentication("login completed but no account is active", None)
            })?
        }
    };

    if let Some(subscription) = subscription.map(str::trim).filter(|s| !s.is_empty())
        && !identity.is_on_subscription(subscription)
    {
        tracing::info!(
            from = %identity.subscription_id,
            to = %subscription,
            "Switching subscription"
        );
        provider.set_subscription(subscription).await.map_err(|e| {
            DeployError::authentication(
                format!("could not select subscription '{subscription}'"),
                Some(e),
            )
        })?;
        identity = current(provider).await?.ok_or_else(|| {
            DeployError::authentication("no account is active after switching subscription", None)
        })?;
        if !identity.is_on_subscription(subscription) {
            return Err(DeployError::authentication(
                format!(
                    "subscription '{subscription}' is still not active (active: {})",
                    identity.subscription_id
                ),
                None,
            ));
        }
    }

    tracing::info!(
        user = %identity.user,
        subscription = %identity.subscription_id,
        "Session ready"
    );
    Ok(SessionContext::new(identity))
}

async fn current(
    provider: &dyn SessionProvider,
) -> Result<Option<foundry_core::Identity>, DeployError> {
    provider
        .current_identity()
        .await
        .map_err(|e| DeployError::authentication("could not read the active account", Some(e)))
}
