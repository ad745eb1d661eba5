//! `ecsup delete` — stop and delete the instance.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::reconcile::{self, Target};
use crate::commands::TargetArgs;

/// Run `ecsup delete`.
///
/// # Errors
///
/// Returns an error if the instance cannot be stopped or deleted.
pub async fn run(app: &AppContext, args: &TargetArgs) -> Result<ExitCode> {
    let locator = args.locator(&app.config)?;
    let cloud = app.cloud()?;

    if !app.output.quiet {
        println!();
        println!("This will stop and permanently delete the instance matching {locator}.");
        println!("Its system disk is released with it.");
        println!();
    }
    if !app.confirm("Continue?", true)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let reporter = app.reporter();
    let target = Target {
        region: app.config.region()?,
        locator: &locator,
        launch: None,
    };
    if reconcile::delete(&cloud, &reporter, target, &app.polling()).await? {
        reporter.success("instance deleted");
    } else {
        reporter.warn(&format!("no instance matches {locator}; nothing to delete"));
    }
    Ok(ExitCode::SUCCESS)
}
