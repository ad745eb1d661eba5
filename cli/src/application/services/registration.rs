//! Application service — domain name listing and availability checks.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};

use crate::application::ports::DomainApi;
use crate::domain::registration::normalize_domain_name;
use crate::domain::{DomainCheck, RegisteredDomain};

/// Domains registered under the account.
///
/// # Errors
///
/// Returns an error if the provider call fails.
pub async fn list(api: &impl DomainApi) -> Result<Vec<RegisteredDomain>> {
    api.list_domains()
        .await
        .context("listing registered domains")
}

/// Check whether `name` can be registered. The name is validated and
/// lower-cased before the provider sees it.
///
/// # Errors
///
/// Returns an error if `name` is not a domain name or the provider call fails.
pub async fn check(api: &impl DomainApi, name: &str) -> Result<DomainCheck> {
    let name = normalize_domain_name(name)?;
    api.check_domain(&name)
        .await
        .with_context(|| format!("checking {name}"))
}
