//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::any::Any;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::domain::{
    DomainCheck, EcsConfig, Instance, LaunchSpec, Locator, NetworkResource, OutputLine,
    RegisteredDomain,
};

// ── Cloud API Port Traits ─────────────────────────────────────────────────────

/// Instance operations of the cloud provider.
///
/// Every call is a single request; the provider is eventually consistent, so
/// an accepted request does not mean the next listing reflects it.
#[allow(async_fn_in_trait)]
pub trait InstanceApi {
    /// List instances in `region`, optionally narrowed server-side by `filter`.
    ///
    /// Callers must still check [`Locator::matches`] on the result.
    async fn list_instances(&self, region: &str, filter: Option<&Locator>)
    -> Result<Vec<Instance>>;
    /// Request a new instance in `subnet_id`; returns the new instance id.
    async fn create_instance(
        &self,
        region: &str,
        subnet_id: &str,
        spec: &LaunchSpec,
    ) -> Result<String>;
    async fn start_instance(&self, id: &str) -> Result<()>;
    async fn stop_instance(&self, id: &str, force: bool) -> Result<()>;
    async fn reboot_instance(&self, id: &str) -> Result<()>;
    async fn delete_instance(&self, id: &str) -> Result<()>;
    /// Request a public address; returns the address if the provider
    /// assigned one synchronously.
    async fn allocate_public_address(&self, id: &str) -> Result<String>;
}

/// Virtual network and subnet operations of the cloud provider.
#[allow(async_fn_in_trait)]
pub trait NetworkApi {
    async fn list_networks(&self, region: &str) -> Result<Vec<NetworkResource>>;
    /// Request a network; returns its id.
    async fn create_network(&self, region: &str, cidr: &str) -> Result<String>;
    async fn list_subnets(&self, region: &str) -> Result<Vec<NetworkResource>>;
    /// Request a subnet; returns its id.
    async fn create_subnet(
        &self,
        region: &str,
        zone: &str,
        network_id: &str,
        cidr: &str,
    ) -> Result<String>;
}

/// Composite trait: anything implementing both sub-traits is a `CloudApi`.
pub trait CloudApi: InstanceApi + NetworkApi {}

/// Blanket implementation: any type implementing both sub-traits is a `CloudApi`.
impl<T> CloudApi for T where T: InstanceApi + NetworkApi {}

/// Domain name registration API of the cloud provider.
#[allow(async_fn_in_trait)]
pub trait DomainApi {
    /// Every domain registered under the account, ordered by registration date.
    async fn list_domains(&self) -> Result<Vec<RegisteredDomain>>;
    /// Registry availability and one-year price for `name`.
    async fn check_domain(&self, name: &str) -> Result<DomainCheck>;
}

// ── Transport Port ────────────────────────────────────────────────────────────

/// A process started on the remote host with three byte streams.
pub struct RemoteProcess {
    pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
    pub stdout: Box<dyn AsyncRead + Send + Unpin>,
    pub stderr: Box<dyn AsyncRead + Send + Unpin>,
    /// Keeps the underlying process or channel alive; dropping it tears the
    /// process down.
    pub guard: Box<dyn Any + Send>,
}

impl std::fmt::Debug for RemoteProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteProcess").finish_non_exhaustive()
    }
}

/// An authenticated connection able to start remote processes.
///
/// One session may host several processes at once: the command shell and a
/// copy process typically share it.
#[allow(async_fn_in_trait)]
pub trait TransportSession {
    /// Start `command` on the remote host with piped stdio.
    ///
    /// # Errors
    ///
    /// Returns an error if the process or channel cannot be opened.
    async fn spawn(&self, command: &str) -> Result<RemoteProcess>;
}

/// Establishes transport sessions to a host.
#[allow(async_fn_in_trait)]
pub trait Connector {
    type Session: TransportSession;

    /// Connect and authenticate, retrying until the connector's own deadline.
    ///
    /// # Errors
    ///
    /// Returns an error once the host stays unreachable past the deadline or
    /// rejects the credentials.
    async fn connect(&self, host: &str) -> Result<Self::Session>;
}

/// A bidirectional byte stream that can move between tasks.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Opens TCP connections from the far side of a session.
#[allow(async_fn_in_trait)]
pub trait Forwarder {
    /// Connect to `host:port` as seen from the remote host.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote side refuses or cannot reach the target.
    async fn forward(&self, host: &str, port: u16) -> Result<Box<dyn ByteStream>>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit a status message that repeats while a poll loop waits.
    ///
    /// Consecutive identical messages are expected and should not flood the
    /// terminal.
    fn waiting(&self, message: &str);
    /// Emit one line of output produced by a remote command.
    fn remote_output(&self, line: &OutputLine);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if stored configuration exists but cannot be read.
    fn load(&self) -> Result<EcsConfig>;
    /// Persist `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    fn save(&self, config: &EcsConfig) -> Result<()>;
    /// Location of the stored configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the location cannot be determined.
    fn path(&self) -> Result<std::path::PathBuf>;
}
