//! JSON output helpers.
//!
//! Used by every `--json` code path, including the error object printed when
//! a command fails.

use anyhow::{Context, Result};

use crate::application::services::bootstrap::Provisioned;
use crate::application::services::transfer::Transferred;
use crate::domain::{DomainCheck, EcsConfig, Instance, RegisteredDomain};

/// Machine-readable renderer writing pretty-printed JSON to stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Render instances as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_instances(&self, instances: &[Instance]) -> Result<()> {
        let out = serde_json::to_string_pretty(instances).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Render the configuration together with the file it came from.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &EcsConfig, path: &std::path::Path) -> Result<()> {
        let obj = serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        });
        let out = serde_json::to_string_pretty(&obj).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Render the outcome of `up` for the instance called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_provisioned(&self, name: &str, provisioned: &Provisioned) -> Result<()> {
        let obj = serde_json::json!({
            "name": name,
            "address": provisioned.address,
            "created": provisioned.created,
            "bootstrapped": provisioned.bootstrapped,
        });
        let out = serde_json::to_string_pretty(&obj).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Render a validated dry-run `up`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_dry_run(&self, name: &str) -> Result<()> {
        let obj = serde_json::json!({
            "name": name,
            "dry_run": true,
            "created": false,
        });
        let out = serde_json::to_string_pretty(&obj).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Render registered domains as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_domains(&self, domains: &[RegisteredDomain]) -> Result<()> {
        let out = serde_json::to_string_pretty(domains).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Render an availability check with both the registry code and its
    /// meaning.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_domain_check(&self, check: &DomainCheck) -> Result<()> {
        let obj = serde_json::json!({
            "name": check.name,
            "registrable": check.availability.is_registrable(),
            "availability": check.availability.to_string(),
            "code": check.availability.code(),
            "reason": check.reason,
            "price": check.price,
        });
        let out = serde_json::to_string_pretty(&obj).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }

    /// Render copy totals.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_transferred(&self, totals: &Transferred) -> Result<()> {
        let out = serde_json::to_string_pretty(totals).context("JSON serialization failed")?;
        println!("{out}");
        Ok(())
    }
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}
