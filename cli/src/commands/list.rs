//! `ecsup list` — show instances in every known region.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::inventory;
use crate::domain::config::known_regions;

/// Run `ecsup list`.
///
/// # Errors
///
/// Returns an error if any region cannot be listed.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let cloud = app.cloud()?;
    let instances = inventory::list_all(&cloud, &known_regions()).await?;
    app.renderer().render_instances(&instances)?;
    Ok(ExitCode::SUCCESS)
}
