//! Aliyun Domain implementation of the `DomainApi` port.
//!
//! Same signed RPC scheme as ECS, against the domain product's endpoint and
//! API version.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::application::ports::DomainApi;
use crate::domain::registration::{Availability, DomainCheck, RegisteredDomain};
use crate::infra::aliyun::{Paging, RpcClient};

/// Public domain registration endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://domain.aliyuncs.com";

const API_VERSION: &str = "2018-01-29";
const DOMAIN_PAGES: Paging = Paging {
    number_key: "PageNum",
    size: 50,
};
/// Prices are quoted for a one-year registration in CNY.
const FEE_CURRENCY: &str = "CNY";

/// Signed client for the domain registration API.
#[derive(Debug)]
pub struct AliyunDomains {
    rpc: RpcClient,
}

impl AliyunDomains {
    /// Build a client for `endpoint` (or [`DEFAULT_ENDPOINT`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(
                access_key_id,
                access_key_secret,
                endpoint.unwrap_or(DEFAULT_ENDPOINT),
                API_VERSION,
            )?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryDomainListResponse {
    #[serde(default)]
    data: DomainSet,
    #[serde(default)]
    total_item_num: usize,
}

#[derive(Debug, Default, Deserialize)]
struct DomainSet {
    #[serde(rename = "Domain", default)]
    items: Vec<RawDomain>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawDomain {
    domain_name: String,
    domain_status: String,
    domain_type: String,
    registration_date: String,
    expiration_date: String,
}

impl From<RawDomain> for RegisteredDomain {
    fn from(raw: RawDomain) -> Self {
        Self {
            name: raw.domain_name,
            status: raw.domain_status,
            kind: raw.domain_type,
            registered_at: raw.registration_date,
            expires_at: raw.expiration_date,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CheckDomainResponse {
    #[serde(default)]
    domain_name: String,
    avail: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    price: Option<i64>,
}

fn check_from(resp: CheckDomainResponse, asked: &str) -> Result<DomainCheck> {
    let code: i64 = resp
        .avail
        .trim()
        .parse()
        .with_context(|| format!("CheckDomain: availability '{}' is not a number", resp.avail))?;
    Ok(DomainCheck {
        name: if resp.domain_name.is_empty() {
            asked.to_string()
        } else {
            resp.domain_name
        },
        availability: Availability::from_code(code),
        reason: resp.reason,
        price: resp.price,
    })
}

fn params<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

impl DomainApi for AliyunDomains {
    async fn list_domains(&self) -> Result<Vec<RegisteredDomain>> {
        let raw = self
            .rpc
            .call_paged(
                "QueryDomainList",
                &params([("OrderKeyType", "RegistrationDate".to_string())]),
                DOMAIN_PAGES,
                |resp: QueryDomainListResponse| (resp.data.items, resp.total_item_num),
            )
            .await?;
        Ok(raw.into_iter().map(RegisteredDomain::from).collect())
    }

    async fn check_domain(&self, name: &str) -> Result<DomainCheck> {
        let resp: CheckDomainResponse = self
            .rpc
            .call(
                "CheckDomain",
                params([
                    ("DomainName", name.to_string()),
                    ("FeeCurrency", FEE_CURRENCY.to_string()),
                    ("FeeCommand", "create".to_string()),
                    ("FeePeriod", "1".to_string()),
                ]),
            )
            .await?;
        check_from(resp, name)
    }
}
