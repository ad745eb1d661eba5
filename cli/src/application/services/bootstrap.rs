//! Application service — bring an instance up and initialise it.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::{CloudApi, Connector, ProgressReporter, TransportSession};
use crate::application::services::polling::Polling;
use crate::application::services::reconcile::{self, Target};
use crate::application::services::shell::{RemoteShell, run_batch};

/// Outcome of [`provision`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Provisioned {
    pub address: String,
    /// This run created the instance.
    pub created: bool,
    /// Init commands were run.
    pub bootstrapped: bool,
}

/// Bring the instance up and, if this run created it, run `init_cmds` on it.
///
/// A failed bootstrap is reported as an error but the instance is left
/// running; nothing is rolled back.
///
/// # Errors
///
/// Returns an error if reconciliation fails, the host cannot be reached, or
/// the command channel breaks.
pub async fn provision(
    cloud: &impl CloudApi,
    connector: &impl Connector,
    reporter: &impl ProgressReporter,
    target: Target<'_>,
    polling: &Polling,
    init_cmds: &[String],
) -> Result<Provisioned> {
    let (address, created) = reconcile::up(cloud, reporter, target, polling).await?;
    reporter.success(&format!("instance is up and running, address {address}"));
    if !created || init_cmds.is_empty() {
        return Ok(Provisioned {
            address,
            created,
            bootstrapped: false,
        });
    }

    reporter.step(&format!("waiting for {address} to accept logins"));
    let session = connector
        .connect(&address)
        .await
        .with_context(|| format!("connecting to new instance at {address}"))?;
    run_commands(&session, reporter, init_cmds)
        .await
        .context("initialising instance environment")?;
    Ok(Provisioned {
        address,
        created,
        bootstrapped: true,
    })
}

/// Run `commands` in order on a single shell opened over `session`.
///
/// # Errors
///
/// Returns an error if the shell cannot be opened or the channel fails. The
/// shell is closed in either case.
pub async fn run_commands(
    session: &impl TransportSession,
    reporter: &impl ProgressReporter,
    commands: &[String],
) -> Result<()> {
    let mut shell = RemoteShell::open(session).await?;
    let result = run_batch(&mut shell, reporter, commands).await;
    let closed = shell.close().await;
    result?;
    closed?;
    reporter.success(&format!("ran {} command(s)", commands.len()));
    Ok(())
}
