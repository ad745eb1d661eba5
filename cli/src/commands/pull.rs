//! `ecsup pull` — copy a remote file or directory from an instance.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::transfer;
use crate::commands::{TargetArgs, connect};

/// Arguments for the pull command.
#[derive(Args, Debug)]
pub struct PullArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Remote file or directory
    pub remote: String,

    /// Local destination; an existing directory receives the copy inside it
    pub local: PathBuf,
}

/// Run `ecsup pull`.
///
/// # Errors
///
/// Returns an error if the instance cannot be reached or the copy fails.
pub async fn run(app: &AppContext, args: &PullArgs) -> Result<ExitCode> {
    let session = connect(app, &args.target).await?;
    let reporter = app.reporter();
    reporter.step(&format!(
        "copying {} to {}",
        args.remote,
        args.local.display()
    ));
    let done = transfer::copy_from(&session, &args.remote, &args.local)
        .await
        .with_context(|| format!("copying {} to {}", args.remote, args.local.display()))?;
    reporter.success(&format!(
        "copied {} file(s) in {} dir(s), {} bytes",
        done.files, done.dirs, done.bytes
    ));
    drop(reporter);
    app.renderer().render_transferred(&done)?;
    Ok(ExitCode::SUCCESS)
}
