//! `ecsup down` — stop the instance, keeping its disk.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::reconcile::{self, Target};
use crate::commands::TargetArgs;

/// Run `ecsup down`.
///
/// # Errors
///
/// Returns an error if the instance cannot be stopped.
pub async fn run(app: &AppContext, args: &TargetArgs) -> Result<ExitCode> {
    let locator = args.locator(&app.config)?;
    let cloud = app.cloud()?;
    let reporter = app.reporter();
    let target = Target {
        region: app.config.region()?,
        locator: &locator,
        launch: None,
    };

    if reconcile::down(&cloud, &reporter, target, &app.polling()).await? {
        reporter.success("instance is stopped");
    } else {
        reporter.warn(&format!("no instance matches {locator}; nothing to stop"));
    }
    Ok(ExitCode::SUCCESS)
}
