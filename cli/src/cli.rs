//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Provision, bootstrap and tear down Aliyun ECS instances
#[derive(Parser)]
#[command(
    name = "ecsup",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output (any non-empty `NO_COLOR` counts)
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Log provider calls and protocol traffic to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to confirmation prompts
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create or start the instance, then run init commands on a new one
    Up(commands::up::UpArgs),

    /// Stop the instance
    Down(commands::TargetArgs),

    /// Stop and delete the instance
    Delete(commands::TargetArgs),

    /// Reboot a running instance
    Reboot(commands::TargetArgs),

    /// List instances in every known region
    List,

    /// Run shell commands on the instance
    Run(commands::run::RunArgs),

    /// Copy a local file or directory to the instance
    Push(commands::push::PushArgs),

    /// Copy a remote file or directory from the instance
    Pull(commands::pull::PullArgs),

    /// Serve a local SOCKS5 proxy that connects out from the instance
    Proxy(commands::proxy::ProxyArgs),

    /// List registered domains or check whether a name is available
    #[command(subcommand)]
    Domain(commands::domain::DomainCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
            ..
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        })?;

        match command {
            Command::Up(args) => commands::up::run(&app, &args).await,
            Command::Down(args) => commands::down::run(&app, &args).await,
            Command::Delete(args) => commands::delete::run(&app, &args).await,
            Command::Reboot(args) => commands::reboot::run(&app, &args).await,
            Command::List => commands::list::run(&app).await,
            Command::Run(args) => commands::run::run(&app, &args).await,
            Command::Push(args) => commands::push::run(&app, &args).await,
            Command::Pull(args) => commands::pull::run(&app, &args).await,
            Command::Proxy(args) => commands::proxy::run(&app, &args).await,
            Command::Domain(cmd) => commands::domain::run(&app, &cmd).await,
            Command::Config(cmd) => commands::config::run(&app, &cmd),
        }
    }
}
