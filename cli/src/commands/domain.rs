//! `ecsup domain` — list registered domains and check name availability.

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::registration;

/// Domain subcommands.
#[derive(Subcommand, Debug)]
pub enum DomainCommand {
    /// List domains registered under the account
    List,
    /// Check whether a domain name can be registered, with its price
    Check {
        /// Domain name, e.g. `example.com`
        name: String,
    },
}

/// Run the domain command.
///
/// # Errors
///
/// Returns an error if the API keys are missing, the name is malformed or
/// the provider call fails.
pub async fn run(app: &AppContext, cmd: &DomainCommand) -> Result<ExitCode> {
    match cmd {
        DomainCommand::List => {
            let domains = registration::list(&app.domains()?).await?;
            app.renderer().render_domains(&domains)?;
        }
        DomainCommand::Check { name } => {
            let check = registration::check(&app.domains()?, name).await?;
            app.renderer().render_domain_check(&check)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
