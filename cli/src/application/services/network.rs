//! Application service — network prerequisites for instance creation.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Describe-before-create: one available network per region, one available
//! subnet per zone inside it.

use tracing::{debug, warn};

use crate::application::ports::{NetworkApi, ProgressReporter};
use crate::application::services::polling::Polling;
use crate::domain::error::NetworkError;
use crate::domain::network::{
    Converge, Convergence, NETWORK_CIDR, NetworkIds, next_subnet_cidr, subnet_in_scope,
};

/// Ensure a usable network and subnet exist for `zone`, creating them if
/// needed.
///
/// Failed list or create calls are logged and retried on the next tick.
///
/// # Errors
///
/// Returns [`NetworkError::NoUsableNetwork`] / [`NetworkError::NoUsableSubnet`]
/// when an accepted create never yields a usable resource,
/// [`NetworkError::SubnetRangeExhausted`] when no subnet range is left, and
/// [`NetworkError::TimedOut`] when the deadline passes.
pub async fn ensure_network(
    cloud: &impl NetworkApi,
    reporter: &impl ProgressReporter,
    region: &str,
    zone: &str,
    polling: &Polling,
) -> Result<NetworkIds, NetworkError> {
    let network_id = ensure_vpc(cloud, reporter, region, zone, polling).await?;
    let subnet_id = ensure_subnet(cloud, reporter, region, zone, &network_id, polling).await?;
    reporter.success(&format!("network ready ({network_id} / {subnet_id})"));
    Ok(NetworkIds {
        network_id,
        subnet_id,
    })
}

async fn ensure_vpc(
    cloud: &impl NetworkApi,
    reporter: &impl ProgressReporter,
    region: &str,
    zone: &str,
    polling: &Polling,
) -> Result<String, NetworkError> {
    let mut convergence = Convergence::default();
    let mut ticker = polling.ticker();
    loop {
        if !ticker.tick().await {
            return Err(timed_out(zone, polling));
        }
        let networks = match cloud.list_networks(region).await {
            Ok(networks) => networks,
            Err(e) => {
                warn!(region, error = %format!("{e:#}"), "listing networks failed");
                reporter.warn(&format!("error querying networks: {e:#}"));
                continue;
            }
        };
        match convergence.observe(&networks) {
            Converge::Ready(id) => return Ok(id),
            Converge::Wait => reporter.waiting("waiting for virtual network to become available"),
            Converge::Create => {
                reporter.step(&format!("creating virtual network in {region}"));
                let accepted = match cloud.create_network(region, NETWORK_CIDR).await {
                    Ok(id) => {
                        debug!(region, network_id = %id, "network creation accepted");
                        true
                    }
                    Err(e) => {
                        warn!(region, error = %format!("{e:#}"), "creating network failed");
                        reporter.warn(&format!("error creating network: {e:#}"));
                        false
                    }
                };
                convergence.record(accepted);
            }
            Converge::NoUsableResource => {
                return Err(NetworkError::NoUsableNetwork {
                    region: region.to_string(),
                });
            }
        }
    }
}

async fn ensure_subnet(
    cloud: &impl NetworkApi,
    reporter: &impl ProgressReporter,
    region: &str,
    zone: &str,
    network_id: &str,
    polling: &Polling,
) -> Result<String, NetworkError> {
    let mut convergence = Convergence::default();
    let mut ticker = polling.ticker();
    loop {
        if !ticker.tick().await {
            return Err(timed_out(zone, polling));
        }
        let subnets = match cloud.list_subnets(region).await {
            Ok(subnets) => subnets,
            Err(e) => {
                warn!(region, error = %format!("{e:#}"), "listing subnets failed");
                reporter.warn(&format!("error querying subnets: {e:#}"));
                continue;
            }
        };
        let in_scope = subnets
            .iter()
            .filter(|s| subnet_in_scope(s, network_id, zone));
        match convergence.observe(in_scope) {
            Converge::Ready(id) => return Ok(id),
            Converge::Wait => reporter.waiting("waiting for subnet to become available"),
            Converge::Create => {
                let cidr = next_subnet_cidr(&subnets, network_id).ok_or_else(|| {
                    NetworkError::SubnetRangeExhausted {
                        network_id: network_id.to_string(),
                    }
                })?;
                reporter.step(&format!("creating subnet {cidr} in {zone}"));
                let accepted = match cloud.create_subnet(region, zone, network_id, &cidr).await {
                    Ok(id) => {
                        debug!(zone, subnet_id = %id, %cidr, "subnet creation accepted");
                        true
                    }
                    Err(e) => {
                        warn!(zone, error = %format!("{e:#}"), "creating subnet failed");
                        reporter.warn(&format!("error creating subnet: {e:#}"));
                        false
                    }
                };
                convergence.record(accepted);
            }
            Converge::NoUsableResource => {
                return Err(NetworkError::NoUsableSubnet {
                    zone: zone.to_string(),
                });
            }
        }
    }
}

fn timed_out(zone: &str, polling: &Polling) -> NetworkError {
    NetworkError::TimedOut {
        zone: zone.to_string(),
        after: polling.budget(),
    }
}
