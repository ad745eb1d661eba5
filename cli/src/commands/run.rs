//! `ecsup run` — run shell commands on an instance.

use anyhow::{Result, bail};
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::bootstrap;
use crate::commands::{TargetArgs, connect};

/// Arguments for the run command.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Commands to run, one per argument (defaults to `init_cmds`)
    #[arg(trailing_var_arg = true)]
    pub commands: Vec<String>,
}

/// Run `ecsup run`.
///
/// # Errors
///
/// Returns an error if there is nothing to run, the instance cannot be
/// reached, or the command channel breaks.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<ExitCode> {
    let commands = if args.commands.is_empty() {
        &app.config.init_cmds
    } else {
        &args.commands
    };
    if commands.is_empty() {
        bail!("nothing to run: pass commands or set init_cmds in the config");
    }

    let session = connect(app, &args.target).await?;
    bootstrap::run_commands(&session, &app.reporter(), commands).await?;
    Ok(ExitCode::SUCCESS)
}
