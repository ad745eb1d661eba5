//! Domain types and validators for ecsup configuration.
//!
//! Pure functions only — no I/O, no async, no filesystem access.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::instance::LaunchSpec;

// ── Zones and regions ────────────────────────────────────────────────────────

/// Zones ecsup knows how to launch into, with their region and short name.
pub const ZONES: &[(&str, &str)] = &[
    ("cn-hangzhou-b", "cn-hangzhou"),
    ("cn-hongkong-b", "cn-hongkong"),
    ("cn-hongkong-c", "cn-hongkong"),
    ("ap-southeast-1c", "ap-southeast-1"),
];

const REGION_SHORT_NAMES: &[(&str, &str)] = &[
    ("cn-hangzhou", "hz"),
    ("cn-hongkong", "hk"),
    ("ap-southeast-1", "sg"),
];

/// Region a zone belongs to.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownZone`] if the zone is not in [`ZONES`].
pub fn region_for_zone(zone: &str) -> Result<&'static str, ConfigError> {
    ZONES
        .iter()
        .find(|(z, _)| *z == zone)
        .map(|(_, r)| *r)
        .ok_or_else(|| ConfigError::UnknownZone {
            zone: zone.to_string(),
            known: ZONES
                .iter()
                .map(|(z, _)| *z)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Every distinct region reachable from [`ZONES`], in table order.
#[must_use]
pub fn known_regions() -> Vec<&'static str> {
    let mut regions: Vec<&'static str> = Vec::new();
    for (_, region) in ZONES {
        if !regions.contains(region) {
            regions.push(region);
        }
    }
    regions
}

/// Two-letter abbreviation used in listings; the full id when unknown.
#[must_use]
pub fn region_short_name(region: &str) -> &str {
    REGION_SHORT_NAMES
        .iter()
        .find(|(r, _)| *r == region)
        .map_or(region, |(_, short)| short)
}

// ── Instance names ───────────────────────────────────────────────────────────

/// Provider rule: 2-128 characters, leading letter, then letters, digits,
/// `.`, `_`, `:` or `-`.
pub static INSTANCE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z][A-Za-z0-9._:\-]{1,127}$").expect("valid regex")
});

/// Validates an instance name before it reaches the provider.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidInstanceName`] if the name does not match
/// [`INSTANCE_NAME_RE`].
pub fn validate_instance_name(name: &str) -> Result<(), ConfigError> {
    if INSTANCE_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidInstanceName(name.to_string()))
    }
}

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.ecsup/config.yaml`.
///
/// Every field has a default, so an empty or missing file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    pub zone: String,
    pub instance_name: String,
    pub instance_type: String,
    pub image: String,
    pub instance_charge_type: String,
    pub internet_charge_type: String,
    pub bandwidth_in: u32,
    pub bandwidth_out: u32,
    pub system_disk_category: String,
    pub system_disk_size: u32,
    /// Commands run on a freshly created instance, in order.
    pub init_cmds: Vec<String>,
    pub poll_interval_ms: u64,
    /// Deadline for one reconciliation run; `0` waits forever.
    pub timeout_secs: u64,
    pub ssh_user: String,
    pub ssh_port: u16,
    /// Private key for remote login; password login is used when unset.
    pub private_key: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// API endpoint; `None` uses `https://ecs.aliyuncs.com`.
    pub endpoint: Option<String>,
    pub dry_run: bool,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            zone: "cn-hongkong-b".to_string(),
            instance_name: "ecsup".to_string(),
            instance_type: "ecs.t5-lc1m2.small".to_string(),
            image: "ubuntu_16_04_64_20G_alibase_20190513.vhd".to_string(),
            instance_charge_type: "PostPaid".to_string(),
            internet_charge_type: "PayByTraffic".to_string(),
            bandwidth_in: 5,
            bandwidth_out: 5,
            system_disk_category: "cloud_ssd".to_string(),
            system_disk_size: 20,
            init_cmds: Vec::new(),
            poll_interval_ms: 500,
            timeout_secs: 1800,
            ssh_user: "root".to_string(),
            ssh_port: 22,
            private_key: None,
            connect_timeout_secs: 300,
            endpoint: None,
            dry_run: false,
        }
    }
}

impl EcsConfig {
    /// Region of the configured zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone is unknown.
    pub fn region(&self) -> Result<&'static str> {
        Ok(region_for_zone(&self.zone)?)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Launch parameters for an instance called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or zone is invalid.
    pub fn launch_spec(&self, name: &str, credentials: &Credentials) -> Result<LaunchSpec> {
        validate_instance_name(name)?;
        region_for_zone(&self.zone)?;
        Ok(LaunchSpec {
            name: name.to_string(),
            zone: self.zone.clone(),
            instance_type: self.instance_type.clone(),
            image: self.image.clone(),
            password: credentials.root_pwd.clone(),
            key_pair_name: credentials.key_pair_name.clone(),
            instance_charge_type: self.instance_charge_type.clone(),
            internet_charge_type: self.internet_charge_type.clone(),
            bandwidth_in: self.bandwidth_in,
            bandwidth_out: self.bandwidth_out,
            system_disk_category: self.system_disk_category.clone(),
            system_disk_size: self.system_disk_size,
            dry_run: self.dry_run,
        })
    }
}

/// Keys accepted by [`EcsConfig::set`].
pub const SETTABLE_KEYS: &[&str] = &[
    "zone",
    "instance_name",
    "instance_type",
    "image",
    "ssh_user",
    "ssh_port",
    "private_key",
    "poll_interval_ms",
    "timeout_secs",
    "connect_timeout_secs",
    "endpoint",
    "dry_run",
];

impl EcsConfig {
    /// Set one scalar field from its string form.
    ///
    /// An empty value clears optional fields (`private_key`, `endpoint`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKey`] for keys outside
    /// [`SETTABLE_KEYS`] and [`ConfigError::InvalidValue`] when the value
    /// does not parse or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let optional = || (!value.is_empty()).then(|| value.to_string());
        match key {
            "zone" => {
                region_for_zone(value)?;
                self.zone = value.to_string();
            }
            "instance_name" => {
                validate_instance_name(value)?;
                self.instance_name = value.to_string();
            }
            "instance_type" => self.instance_type = value.to_string(),
            "image" => self.image = value.to_string(),
            "ssh_user" => self.ssh_user = value.to_string(),
            "ssh_port" => self.ssh_port = value.parse().map_err(|_| invalid("expected a port number"))?,
            "private_key" => self.private_key = optional().map(PathBuf::from),
            "poll_interval_ms" => {
                self.poll_interval_ms = value.parse().map_err(|_| invalid("expected milliseconds"))?;
            }
            "timeout_secs" => {
                self.timeout_secs = value.parse().map_err(|_| invalid("expected seconds"))?;
            }
            "connect_timeout_secs" => {
                self.connect_timeout_secs = value.parse().map_err(|_| invalid("expected seconds"))?;
            }
            "endpoint" => self.endpoint = optional(),
            "dry_run" => self.dry_run = value.parse().map_err(|_| invalid("expected true or false"))?,
            _ => {
                return Err(ConfigError::UnknownKey {
                    key: key.to_string(),
                    known: SETTABLE_KEYS.join(", "),
                });
            }
        }
        Ok(())
    }
}

// ── Credentials ──────────────────────────────────────────────────────────────

/// Secrets read from `ECS_*` environment variables.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub access_key_secret: Option<String>,
    #[serde(default)]
    pub root_pwd: Option<String>,
    #[serde(default)]
    pub key_pair_name: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &redact(&self.access_key_secret))
            .field("root_pwd", &redact(&self.root_pwd))
            .field("key_pair_name", &self.key_pair_name)
            .finish()
    }
}

impl Credentials {
    /// The API key pair, both halves non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] naming the first missing
    /// variable.
    pub fn api_keys(&self) -> Result<(&str, &str), ConfigError> {
        let id = non_empty(self.access_key_id.as_deref())
            .ok_or(ConfigError::MissingCredential("ECS_ACCESS_KEY_ID"))?;
        let secret = non_empty(self.access_key_secret.as_deref())
            .ok_or(ConfigError::MissingCredential("ECS_ACCESS_KEY_SECRET"))?;
        Ok((id, secret))
    }

    #[must_use]
    pub fn password(&self) -> Option<&str> {
        non_empty(self.root_pwd.as_deref())
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.is_empty())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
