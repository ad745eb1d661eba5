//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

use super::instance::{DesiredState, InstanceStatus};

// ── Reconciliation errors ─────────────────────────────────────────────────────

/// Terminal failures of a reconciliation run.
///
/// Transient provider errors never show up here: they are logged and the
/// loop polls again.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{count} instances match {locator}; refusing to act on an ambiguous match")]
    AmbiguousLocator { locator: String, count: usize },

    #[error("no instance matches {locator}")]
    NotFound { locator: String },

    #[error("instance matching {locator} disappeared while waiting for it to come back")]
    Vanished { locator: String },

    #[error("cannot reach '{desired}' from status {status}")]
    InvalidState {
        desired: DesiredState,
        status: InstanceStatus,
    },

    #[error("instance matching {locator} is {status} and has no public address")]
    Unreachable {
        locator: String,
        status: InstanceStatus,
    },

    #[error("instance launch parameters are required to bring an instance up")]
    MissingLaunchSpec,

    /// A dry-run create passed the provider's checks. Nothing was created.
    #[error("dry run passed; no instance was created")]
    DryRunPassed,

    #[error("gave up waiting for instance to become {desired} after {}s", .after.as_secs())]
    TimedOut {
        desired: DesiredState,
        after: Duration,
    },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

// ── Network provisioning errors ───────────────────────────────────────────────

/// Failures of the network prerequisite provisioner.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network creation in {region} was accepted but no usable network appeared")]
    NoUsableNetwork { region: String },

    #[error("subnet creation in {zone} was accepted but no usable subnet appeared")]
    NoUsableSubnet { zone: String },

    #[error("no free /24 subnet range left in network {network_id}")]
    SubnetRangeExhausted { network_id: String },

    #[error("gave up waiting for network prerequisites in {zone} after {}s", .after.as_secs())]
    TimedOut { zone: String, after: Duration },
}

// ── Remote shell errors ───────────────────────────────────────────────────────

/// Failures of the remote command channel.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to write to remote shell: {0}")]
    Write(#[source] std::io::Error),

    #[error("error reading remote {stream}: {message}")]
    Reader { stream: &'static str, message: String },

    #[error("remote shell closed its {stream} before the command finished")]
    Closed { stream: &'static str },

    #[error("remote shell is already closed")]
    AlreadyClosed,
}

// ── File transfer errors ──────────────────────────────────────────────────────

/// Failures of the scp-style file transfer protocol.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote copy error: {0}")]
    Remote(String),

    #[error("unexpected protocol byte {0:#04x}")]
    UnexpectedResponse(u8),

    #[error("malformed control line: {0:?}")]
    Protocol(String),

    #[error("{0} is neither a regular file nor a directory")]
    UnsupportedFileType(String),

    #[error("failed to open remote copy process: {0}")]
    Spawn(String),
}

// ── Transport errors ──────────────────────────────────────────────────────────

/// Failures establishing a transport session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {host} within {}s: {last_error}", .after.as_secs())]
    Dial {
        host: String,
        after: Duration,
        last_error: String,
    },

    #[error("authentication as '{user}' was rejected by {host}")]
    Rejected { user: String, host: String },

    #[error("no password or private key configured for remote login")]
    NoCredentials,
}

// ── Proxy errors ──────────────────────────────────────────────────────────────

/// A SOCKS client spoke something the proxy does not serve.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SocksError {
    #[error("unsupported SOCKS version {0}")]
    Version(u8),

    #[error("client offers no supported authentication method")]
    NoAcceptableMethod,

    #[error("unsupported SOCKS command {0}; only CONNECT is served")]
    Command(u8),

    #[error("unsupported SOCKS address type {0}")]
    AddressType(u8),

    #[error("malformed SOCKS request: {0}")]
    Malformed(&'static str),
}

// ── Domain registration errors ────────────────────────────────────────────────

/// Failures of domain name lookups before any provider call.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("invalid domain name '{0}'")]
    InvalidName(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration and credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("unknown zone '{zone}'. Known zones: {known}")]
    UnknownZone { zone: String, known: String },

    #[error(
        "invalid instance name '{0}': 2-128 characters, starting with a letter, \
         containing only letters, digits, '.', '_', ':' and '-'"
    )]
    InvalidInstanceName(String),

    #[error("unknown setting '{key}'. Valid settings: {known}")]
    UnknownKey { key: String, known: String },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
