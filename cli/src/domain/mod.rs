//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod instance;
pub mod network;
pub mod reconcile;
pub mod registration;
pub mod remote;
pub mod socks;

pub use config::{Credentials, EcsConfig};
pub use error::{
    ConfigError, NetworkError, ReconcileError, RegistrationError, ShellError, SocksError,
    TransferError, TransportError,
};
pub use instance::{DesiredState, Instance, InstanceStatus, LaunchSpec, Locator};
pub use network::{NetworkIds, NetworkResource, ResourceStatus};
pub use registration::{Availability, DomainCheck, RegisteredDomain};
pub use remote::{OutputLine, OutputStream};
