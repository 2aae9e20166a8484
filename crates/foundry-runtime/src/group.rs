//! Resource group ensurer.

use crate::error::DeployError;
use crate::provider::ResourceGroupApi;
use foundry_core::{GroupRef, SessionContext};

/// Return the group named `name`, creating it in `location` if it does not exist.
///
/// An existing group is returned as-is; its region and tags are never changed.
pub async fn ensure_group(
    ctx: &SessionContext,
    api: &dyn ResourceGroupApi,
    name: &str,
    location: &str,
) -> Result<GroupRef, DeployError> {
    let provisioning = |source| DeployError::Provisioning {
        group: name.to_string(),
        source,
    };

    if let Some(group) = api.get(ctx, name).await.map_err(provisioning)? {
        if !group.location.eq_ignore_ascii_case(location) {
            tracing::warn!(
                group = %group.name,
                existing = %group.location,
                requested = %location,
                "Resource group exists in a different region; leaving it unchanged"
            );
        }
        tracing::info!(group = %group.name, "Resource group exists");
        return Ok(group);
    }

    tracing::info!(group = %name, location = %location, "Creating resource group");
    let group = api.create(ctx, name, location).await.map_err(provisioning)?;
    Ok(group)
}
