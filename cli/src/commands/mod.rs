//! Command implementations

pub mod config;
pub mod delete;
pub mod domain;
pub mod down;
pub mod list;
pub mod proxy;
pub mod pull;
pub mod push;
pub mod reboot;
pub mod run;
pub mod up;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::{Connector, ProgressReporter};
use crate::application::services::inventory;
use crate::domain::config::validate_instance_name;
use crate::domain::{EcsConfig, Locator};
use crate::infra::ssh::SshSession;

/// Selects the instance a command acts on.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Instance name (defaults to `instance_name` from the config)
    #[arg(long, conflicts_with = "ip")]
    pub name: Option<String>,

    /// Public IP address of the instance
    #[arg(long)]
    pub ip: Option<String>,
}

impl TargetArgs {
    /// Locator for these arguments, falling back to the configured name.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit name is not a valid instance name.
    pub fn locator(&self, config: &EcsConfig) -> Result<Locator> {
        if let Some(ip) = &self.ip {
            return Ok(Locator::Address(ip.clone()));
        }
        let name = self.name.as_deref().unwrap_or(&config.instance_name);
        validate_instance_name(name)?;
        Ok(Locator::Name(name.to_string()))
    }
}

/// Connect to the instance `target` points at.
///
/// An `--ip` target is dialled directly, without API credentials.
async fn connect(app: &AppContext, target: &TargetArgs) -> Result<SshSession> {
    let locator = target.locator(&app.config)?;
    let connector = app.connector()?;
    let address = match &locator {
        Locator::Address(address) => address.clone(),
        Locator::Name(_) => {
            inventory::locate_address(&app.cloud()?, app.config.region()?, &locator).await?
        }
    };
    app.reporter().step(&format!("connecting to {address}"));
    connector.connect(&address).await
}
