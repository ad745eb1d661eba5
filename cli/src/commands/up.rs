//! `ecsup up` — create or start the instance, then bootstrap it.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::bootstrap::{self, Provisioned};
use crate::application::services::reconcile::{self, Target};
use crate::domain::{Locator, ReconcileError};

/// Arguments for the up command.
#[derive(Args, Debug, Default)]
pub struct UpArgs {
    /// Instance name (defaults to `instance_name` from the config)
    #[arg(long)]
    pub name: Option<String>,
}

/// Run `ecsup up`.
///
/// # Errors
///
/// Returns an error if the instance cannot be brought up or bootstrapping
/// fails.
pub async fn run(app: &AppContext, args: &UpArgs) -> Result<ExitCode> {
    let config = &app.config;
    let name = args.name.as_deref().unwrap_or(&config.instance_name);
    let launch = config.launch_spec(name, &app.credentials)?;
    let cloud = app.cloud()?;
    let reporter = app.reporter();
    let polling = app.polling();
    let locator = Locator::Name(name.to_string());
    let target = Target {
        region: config.region()?,
        locator: &locator,
        launch: Some(&launch),
    };

    reporter.step(&format!("bringing up '{name}' in {}", config.zone));
    let result = if config.init_cmds.is_empty() {
        reconcile::up(&cloud, &reporter, target, &polling)
            .await
            .map(|(address, created)| {
                reporter.success(&format!("instance is up and running, address {address}"));
                Provisioned {
                    address,
                    created,
                    bootstrapped: false,
                }
            })
            .map_err(anyhow::Error::from)
    } else {
        // Fail before touching the provider if we could never log in.
        let connector = app.connector()?;
        bootstrap::provision(&cloud, &connector, &reporter, target, &polling, &config.init_cmds)
            .await
    };
    match result {
        Ok(provisioned) => {
            drop(reporter);
            app.renderer().render_provisioned(name, &provisioned)?;
        }
        Err(e) if matches!(
            e.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::DryRunPassed)
        ) => {
            reporter.success("dry run passed, no instance was created");
            drop(reporter);
            app.renderer().render_dry_run(name)?;
        }
        Err(e) => return Err(e),
    }
    Ok(ExitCode::SUCCESS)
}
