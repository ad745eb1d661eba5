//! Application service — list instances across regions.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::InstanceApi;
use crate::application::services::reconcile::select_instance;
use crate::domain::error::ReconcileError;
use crate::domain::{Instance, Locator};

/// List every instance in `regions`, sorted by zone then id.
///
/// # Errors
///
/// Returns an error if listing any region fails.
pub async fn list_all(cloud: &impl InstanceApi, regions: &[&str]) -> Result<Vec<Instance>> {
    let mut instances = Vec::new();
    for region in regions {
        let found = cloud
            .list_instances(region, None)
            .await
            .with_context(|| format!("listing instances in {region}"))?;
        instances.extend(found);
    }
    sort_for_listing(&mut instances);
    Ok(instances)
}

/// Order instances the way `list` shows them.
pub fn sort_for_listing(instances: &mut [Instance]) {
    instances.sort_by(|a, b| a.zone.cmp(&b.zone).then_with(|| a.id.cmp(&b.id)));
}

/// Public address of the instance `locator` points at.
///
/// An address locator is taken as is, without a provider round trip.
///
/// # Errors
///
/// Returns an error if listing fails, the locator is ambiguous or matches
/// nothing, or the instance has no public address yet.
pub async fn locate_address(
    cloud: &impl InstanceApi,
    region: &str,
    locator: &Locator,
) -> Result<String> {
    if let Locator::Address(address) = locator {
        return Ok(address.clone());
    }
    let snapshot = cloud
        .list_instances(region, Some(locator))
        .await
        .with_context(|| format!("listing instances in {region}"))?;
    let instance = select_instance(&snapshot, locator)?.ok_or_else(|| ReconcileError::NotFound {
        locator: locator.to_string(),
    })?;
    let address = instance
        .address()
        .ok_or_else(|| ReconcileError::Unreachable {
            locator: locator.to_string(),
            status: instance.status,
        })?;
    Ok(address.to_string())
}
