//! Instance model as observed from the cloud provider.
//!
//! Pure types only — no I/O, no async.

use std::fmt;

use serde::Serialize;

/// Instance status reported by the provider.
///
/// "Absent" is not a variant: a missing instance is modelled as `None`
/// wherever an observation is passed around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InstanceStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    /// Anything the provider reports that is not one of the above.
    Unknown,
}

impl InstanceStatus {
    /// Map a provider status string onto the lifecycle model.
    ///
    /// Aliyun reports freshly created instances as `Pending`; they are on
    /// their way up, so they count as `Starting`.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "Running" => Self::Running,
            "Starting" | "Pending" => Self::Starting,
            "Stopping" => Self::Stopping,
            "Stopped" => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A compute instance owned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub region: String,
    pub zone: String,
    pub instance_type: String,
    pub status: InstanceStatus,
    pub public_address: Option<String>,
    /// Creation timestamp as reported by the provider.
    pub created_at: String,
}

impl Instance {
    /// Public address, treating an empty string as "no address".
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.public_address.as_deref().filter(|a| !a.is_empty())
    }
}

/// How the instance an operation targets is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Name(String),
    Address(String),
}

impl Locator {
    /// Whether `instance` is the one this locator points at.
    #[must_use]
    pub fn matches(&self, instance: &Instance) -> bool {
        match self {
            Self::Name(name) => instance.name == *name,
            Self::Address(addr) => instance.address() == Some(addr.as_str()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "name '{name}'"),
            Self::Address(addr) => write!(f, "address {addr}"),
        }
    }
}

/// Outcome a reconciliation run converges toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Up,
    Down,
    Deleted,
    Rebooted,
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Deleted => "deleted",
            Self::Rebooted => "rebooted",
        };
        f.write_str(s)
    }
}

/// Launch parameters for creating a new instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub zone: String,
    pub instance_type: String,
    pub image: String,
    /// Root password set at creation time.
    pub password: Option<String>,
    /// Name of a key pair registered with the provider.
    pub key_pair_name: Option<String>,
    pub instance_charge_type: String,
    pub internet_charge_type: String,
    pub bandwidth_in: u32,
    pub bandwidth_out: u32,
    pub system_disk_category: String,
    pub system_disk_size: u32,
    pub dry_run: bool,
}
