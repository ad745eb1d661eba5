//! `ecsup reboot` — restart a running instance.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::reconcile::{self, Target};
use crate::commands::TargetArgs;

/// Run `ecsup reboot`.
///
/// # Errors
///
/// Returns an error if the instance is missing, not running, or does not
/// come back before the deadline.
pub async fn run(app: &AppContext, args: &TargetArgs) -> Result<ExitCode> {
    let locator = args.locator(&app.config)?;
    let cloud = app.cloud()?;
    let reporter = app.reporter();
    let target = Target {
        region: app.config.region()?,
        locator: &locator,
        launch: None,
    };

    match reconcile::reboot(&cloud, &reporter, target, &app.polling()).await? {
        Some(address) => reporter.success(&format!("instance rebooted, address {address}")),
        None => reporter.success("instance rebooted"),
    }
    Ok(ExitCode::SUCCESS)
}
