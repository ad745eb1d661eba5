//! `ecsup proxy` — local SOCKS5 proxy whose connections leave from the
//! instance.

use anyhow::{Context, Result};
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::ProgressReporter;
use crate::application::services::proxy;
use crate::commands::{TargetArgs, connect};

/// Arguments for the proxy command.
#[derive(Args, Debug)]
pub struct ProxyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Local port to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Local address to listen on
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,
}

/// Run `ecsup proxy` until interrupted.
///
/// # Errors
///
/// Returns an error if the local port cannot be bound or the instance cannot
/// be reached.
pub async fn run(app: &AppContext, args: &ProxyArgs) -> Result<ExitCode> {
    let listener = tokio::net::TcpListener::bind((args.bind.as_str(), args.port))
        .await
        .with_context(|| format!("cannot listen on {}:{}", args.bind, args.port))?;
    let session = connect(app, &args.target).await?;
    let reporter = app.reporter();
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let stats = proxy::serve(listener, &session, &reporter, shutdown).await?;
    reporter.success(&format!(
        "proxy stopped after {} connections ({} refused)",
        stats.forwarded, stats.refused
    ));
    Ok(ExitCode::SUCCESS)
}
