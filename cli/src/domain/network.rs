//! Network prerequisites: virtual networks and subnets.
//!
//! Pure functions only. The polling loop that drives [`Convergence`] lives in
//! `application::services::network`.

use serde::Serialize;

/// CIDR block for the per-region virtual network.
pub const NETWORK_CIDR: &str = "172.16.0.0/12";

/// Post-create polls showing neither a pending nor an available resource
/// before creation is declared to have produced nothing usable.
pub const SETTLE_POLLS: u32 = 10;

/// Provisioning status of a network resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceStatus {
    Pending,
    Available,
    Other,
}

impl ResourceStatus {
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "Pending" => Self::Pending,
            "Available" => Self::Available,
            _ => Self::Other,
        }
    }
}

/// A virtual network or a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkResource {
    pub id: String,
    pub region: String,
    /// Zone scope; `None` for region-scoped networks.
    pub zone: Option<String>,
    /// Owning network; `None` for networks themselves.
    pub network_id: Option<String>,
    pub status: ResourceStatus,
    pub cidr: String,
}

/// Identifiers returned by the network provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIds {
    pub network_id: String,
    pub subnet_id: String,
}

/// Next step for one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Converge {
    /// An available resource exists.
    Ready(String),
    /// Something is pending, or a create was accepted and is settling.
    Wait,
    /// Nothing pending and nothing available: request a create.
    Create,
    /// A create was accepted but nothing usable ever appeared.
    NoUsableResource,
}

/// Describe-before-create convergence for a single resource type.
#[derive(Debug)]
pub struct Convergence {
    created: bool,
    empty_polls: u32,
    settle_polls: u32,
}

impl Default for Convergence {
    fn default() -> Self {
        Self::new(SETTLE_POLLS)
    }
}

impl Convergence {
    #[must_use]
    pub fn new(settle_polls: u32) -> Self {
        Self {
            created: false,
            empty_polls: 0,
            settle_polls: settle_polls.max(1),
        }
    }

    /// Decide from the resources currently in scope.
    pub fn observe<'a>(
        &mut self,
        in_scope: impl IntoIterator<Item = &'a NetworkResource>,
    ) -> Converge {
        let mut pending = false;
        for resource in in_scope {
            match resource.status {
                ResourceStatus::Available => return Converge::Ready(resource.id.clone()),
                ResourceStatus::Pending => pending = true,
                ResourceStatus::Other => {}
            }
        }
        if pending {
            self.empty_polls = 0;
            return Converge::Wait;
        }
        if !self.created {
            return Converge::Create;
        }
        self.empty_polls += 1;
        if self.empty_polls >= self.settle_polls {
            Converge::NoUsableResource
        } else {
            Converge::Wait
        }
    }

    /// Report whether the create request was accepted.
    pub fn record(&mut self, accepted: bool) {
        if accepted {
            self.created = true;
            self.empty_polls = 0;
        }
    }
}

/// Whether `subnet` belongs to `network_id` and sits in `zone`.
#[must_use]
pub fn subnet_in_scope(subnet: &NetworkResource, network_id: &str, zone: &str) -> bool {
    subnet.network_id.as_deref() == Some(network_id) && subnet.zone.as_deref() == Some(zone)
}

/// First `172.16.N.0/24` range not used by any subnet of `network_id`.
#[must_use]
pub fn next_subnet_cidr(subnets: &[NetworkResource], network_id: &str) -> Option<String> {
    let used: Vec<&str> = subnets
        .iter()
        .filter(|s| s.network_id.as_deref() == Some(network_id))
        .map(|s| s.cidr.as_str())
        .collect();
    (0..=255u8)
        .map(|n| format!("172.16.{n}.0/24"))
        .find(|cidr| !used.contains(&cidr.as_str()))
}
