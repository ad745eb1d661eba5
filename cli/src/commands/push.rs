//! `ecsup push` — copy a local file or directory to an instance.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::transfer;
use crate::commands::{TargetArgs, connect};

/// Arguments for the push command.
#[derive(Args, Debug)]
pub struct PushArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Local file or directory
    pub local: PathBuf,

    /// Remote directory to copy into; created if missing
    pub remote: String,
}

/// Run `ecsup push`.
///
/// # Errors
///
/// Returns an error if the instance cannot be reached or the copy fails.
pub async fn run(app: &AppContext, args: &PushArgs) -> Result<ExitCode> {
    let session = connect(app, &args.target).await?;
    let reporter = app.reporter();
    reporter.step(&format!(
        "copying {} to {}",
        args.local.display(),
        args.remote
    ));
    let done = transfer::copy_to(&session, &args.local, &args.remote)
        .await
        .with_context(|| format!("copying {} to {}", args.local.display(), args.remote))?;
    reporter.success(&format!(
        "copied {} file(s) in {} dir(s), {} bytes",
        done.files, done.dirs, done.bytes
    ));
    drop(reporter);
    app.renderer().render_transferred(&done)?;
    Ok(ExitCode::SUCCESS)
}
