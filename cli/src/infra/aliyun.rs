//! Aliyun ECS implementation of the `InstanceApi` and `NetworkApi` ports.
//!
//! Also home of [`RpcClient`], the signed request core shared with the
//! domain registration client. Talks to the ECS RPC endpoint directly: every request is a signed `GET`
//! whose query string carries the action, its parameters and a handful of
//! common parameters (see [`common_params`]). Responses are JSON; failures
//! come back as a non-2xx status with a `Code`/`Message` body.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, trace};

use crate::application::ports::{InstanceApi, NetworkApi};
use crate::domain::error::ReconcileError;
use crate::domain::instance::{Instance, InstanceStatus, LaunchSpec, Locator};
use crate::domain::network::{NetworkResource, ResourceStatus};

/// Public ECS endpoint; accepts requests for every region.
pub const DEFAULT_ENDPOINT: &str = "https://ecs.aliyuncs.com";

const API_VERSION: &str = "2014-05-26";
/// Largest page `DescribeInstances` serves.
const INSTANCE_PAGES: Paging = Paging {
    number_key: "PageNumber",
    size: 100,
};
/// Largest page `DescribeVpcs` and `DescribeVSwitches` serve.
const NETWORK_PAGES: Paging = Paging {
    number_key: "PageNumber",
    size: 50,
};
/// Error code of a `DryRun` request that passed every check.
const DRY_RUN_PASSED: &str = "DryRunOperation";

/// RFC 3986 unreserved characters stay as they are; everything else is
/// percent-encoded with upper-case hex.
const RPC_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Signed client for the ECS RPC API.
pub struct AliyunEcs {
    rpc: RpcClient,
}

impl std::fmt::Debug for AliyunEcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunEcs").field("rpc", &self.rpc).finish()
    }
}

impl AliyunEcs {
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

/// Signed RPC client for one product endpoint. Every Aliyun product speaks
/// the same signature scheme and differs only in endpoint and API version.
pub(crate) struct RpcClient {
    client: reqwest::Client,
    endpoint: String,
    version: &'static str,
    access_key_id: String,
    access_key_secret: String,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint)
            .field("version", &self.version)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub(crate) fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        endpoint: &str,
        version: &'static str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            version,
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        })
    }

    /// Send one signed RPC call and decode its JSON body.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        params: BTreeMap<String, String>,
    ) -> Result<T> {
        let mut params = params;
        params.extend(common_params(action, self.version, &self.access_key_id));
        let canonical = canonical_query(&params);
        let signature = sign(&self.access_key_secret, &canonical);
        let url = format!(
            "{}/?Signature={}&{canonical}",
            self.endpoint,
            encode(&signature)
        );
        debug!(action, "rpc request");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("{action} request failed"))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("{action}: cannot read response body"))?;
        trace!(action, %status, body = %body, "rpc response");

        if !status.is_success() {
            return Err(api_error(action, status.as_u16(), &body).into());
        }
        serde_json::from_str(&body).with_context(|| format!("{action}: unexpected response body"))
    }

    /// Fetch every page of a listing. `page` names the page-number parameter
    /// and the page size; `split` pulls the items and the provider's total
    /// count out of one page.
    pub(crate) async fn call_paged<R, T>(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
        page: Paging,
        split: impl Fn(R) -> (Vec<T>, usize),
    ) -> Result<Vec<T>>
    where
        R: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut number = 1usize;
        loop {
            let mut p = params.clone();
            p.insert("PageSize".to_string(), page.size.to_string());
            p.insert(page.number_key.to_string(), number.to_string());
            let (batch, total) = split(self.call::<R>(action, p).await?);
            let fetched = batch.len();
            items.extend(batch);
            if fetched < page.size || items.len() >= total {
                return Ok(items);
            }
            number += 1;
        }
    }
}

/// How a listing action pages its results.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Paging {
    pub number_key: &'static str,
    pub size: usize,
}

// ── Request signing ───────────────────────────────────────────────────────────

fn encode(s: &str) -> String {
    utf8_percent_encode(s, RPC_ENCODE_SET).to_string()
}

/// Parameters every RPC call carries besides its own.
fn common_params(action: &str, version: &str, access_key_id: &str) -> BTreeMap<String, String> {
    [
        ("Action", action.to_string()),
        ("Format", "JSON".to_string()),
        ("Version", version.to_string()),
        ("AccessKeyId", access_key_id.to_string()),
        ("SignatureMethod", "HMAC-SHA1".to_string()),
        ("SignatureVersion", "1.0".to_string()),
        ("SignatureNonce", uuid::Uuid::new_v4().to_string()),
        (
            "Timestamp",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// `k=v` pairs joined by `&`, keys sorted, both sides encoded.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Base64 HMAC-SHA1 of the `GET` string-to-sign, keyed with `secret&`.
fn sign(secret: &str, canonical: &str) -> String {
    let string_to_sign = format!("GET&{}&{}", encode("/"), encode(canonical));
    // HMAC accepts keys of any length.
    #[allow(clippy::expect_used)]
    let mut mac = Hmac::<Sha1>::new_from_slice(format!("{secret}&").as_bytes())
        .expect("hmac accepts any key length");
    mac.update(string_to_sign.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: String,
}

/// A non-2xx answer from the RPC endpoint.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{action} failed: {code} ({message}) [status={status} request={request_id}]")]
    Api {
        action: String,
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("{action} failed: status={status} body={body}")]
    Http {
        action: String,
        status: u16,
        body: String,
    },
}

impl RpcError {
    /// The provider's error code, when the body carried one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            Self::Http { .. } => None,
        }
    }
}

fn api_error(action: &str, status: u16, body: &str) -> RpcError {
    match serde_json::from_str::<ApiError>(body) {
        Ok(e) if !e.code.is_empty() => RpcError::Api {
            action: action.to_string(),
            status,
            code: e.code,
            message: e.message,
            request_id: e.request_id,
        },
        _ => RpcError::Http {
            action: action.to_string(),
            status,
            body: body.to_string(),
        },
    }
}

// ── Response shapes ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    instances: InstanceSet,
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Default, Deserialize)]
struct InstanceSet {
    #[serde(rename = "Instance", default)]
    items: Vec<RawInstance>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawInstance {
    instance_id: String,
    instance_name: String,
    region_id: String,
    zone_id: String,
    instance_type: String,
    status: String,
    public_ip_address: IpSet,
    eip_address: EipAddress,
    creation_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct IpSet {
    ip_address: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct EipAddress {
    ip_address: String,
}

impl From<RawInstance> for Instance {
    fn from(raw: RawInstance) -> Self {
        let public_address = raw
            .public_ip_address
            .ip_address
            .into_iter()
            .find(|a| !a.is_empty())
            .or_else(|| Some(raw.eip_address.ip_address).filter(|a| !a.is_empty()));
        Self {
            id: raw.instance_id,
            name: raw.instance_name,
            region: raw.region_id,
            zone: raw.zone_id,
            instance_type: raw.instance_type,
            status: InstanceStatus::from_provider(&raw.status),
            public_address,
            created_at: raw.creation_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateInstanceResponse {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AllocatePublicIpResponse {
    #[serde(default)]
    ip_address: String,
}

#[derive(Debug, Deserialize)]
struct Empty {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVpcsResponse {
    #[serde(default)]
    vpcs: VpcSet,
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Default, Deserialize)]
struct VpcSet {
    #[serde(rename = "Vpc", default)]
    items: Vec<RawVpc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawVpc {
    vpc_id: String,
    region_id: String,
    status: String,
    cidr_block: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateVpcResponse {
    vpc_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeVSwitchesResponse {
    #[serde(rename = "VSwitches", default)]
    vswitches: VSwitchSet,
    #[serde(default)]
    total_count: usize,
}

#[derive(Debug, Default, Deserialize)]
struct VSwitchSet {
    #[serde(rename = "VSwitch", default)]
    items: Vec<RawVSwitch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RawVSwitch {
    #[serde(rename = "VSwitchId")]
    vswitch_id: String,
    vpc_id: String,
    zone_id: String,
    status: String,
    cidr_block: String,
}

#[derive(Debug, Deserialize)]
struct CreateVSwitchResponse {
    #[serde(rename = "VSwitchId")]
    vswitch_id: String,
}

fn network_from(raw: RawVpc, region: &str) -> NetworkResource {
    NetworkResource {
        id: raw.vpc_id,
        region: if raw.region_id.is_empty() {
            region.to_string()
        } else {
            raw.region_id
        },
        zone: None,
        network_id: None,
        status: ResourceStatus::from_provider(&raw.status),
        cidr: raw.cidr_block,
    }
}

fn subnet_from(raw: RawVSwitch, region: &str) -> NetworkResource {
    NetworkResource {
        id: raw.vswitch_id,
        region: region.to_string(),
        zone: Some(raw.zone_id),
        network_id: Some(raw.vpc_id),
        status: ResourceStatus::from_provider(&raw.status),
        cidr: raw.cidr_block,
    }
}

// ── Parameter builders ────────────────────────────────────────────────────────

fn params<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn describe_params(region: &str, filter: Option<&Locator>) -> BTreeMap<String, String> {
    let mut p = params([("RegionId", region.to_string())]);
    match filter {
        Some(Locator::Name(name)) => {
            p.insert("InstanceName".to_string(), name.clone());
        }
        Some(Locator::Address(addr)) => {
            p.insert(
                "PublicIpAddresses".to_string(),
                serde_json::json!([addr]).to_string(),
            );
        }
        None => {}
    }
    p
}

fn create_params(region: &str, subnet_id: &str, spec: &LaunchSpec) -> BTreeMap<String, String> {
    let mut p = params([
        ("RegionId", region.to_string()),
        ("ZoneId", spec.zone.clone()),
        ("VSwitchId", subnet_id.to_string()),
        ("InstanceName", spec.name.clone()),
        ("HostName", spec.name.clone()),
        ("InstanceType", spec.instance_type.clone()),
        ("ImageId", spec.image.clone()),
        ("InstanceChargeType", spec.instance_charge_type.clone()),
        ("InternetChargeType", spec.internet_charge_type.clone()),
        ("InternetMaxBandwidthIn", spec.bandwidth_in.to_string()),
        ("InternetMaxBandwidthOut", spec.bandwidth_out.to_string()),
        ("SystemDisk.Category", spec.system_disk_category.clone()),
        ("SystemDisk.Size", spec.system_disk_size.to_string()),
        ("DryRun", spec.dry_run.to_string()),
    ]);
    if let Some(password) = &spec.password {
        p.insert("Password".to_string(), password.clone());
    }
    if let Some(key_pair) = &spec.key_pair_name {
        p.insert("KeyPairName".to_string(), key_pair.clone());
    }
    // Only burstable families accept a credit specification.
    if is_burstable(&spec.instance_type) {
        p.insert("CreditSpecification".to_string(), "Unlimited".to_string());
    }
    p
}

fn is_burstable(instance_type: &str) -> bool {
    instance_type
        .split('.')
        .nth(1)
        .is_some_and(|family| family.starts_with("t5") || family.starts_with("t6"))
}

fn is_dry_run_pass(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RpcError>()
        .and_then(RpcError::code)
        .is_some_and(|code| code == DRY_RUN_PASSED)
}

fn instance_params(id: &str) -> BTreeMap<String, String> {
    params([("InstanceId", id.to_string())])
}

// ── Port implementations ──────────────────────────────────────────────────────

impl InstanceApi for AliyunEcs {
    async fn list_instances(
        &self,
        region: &str,
        filter: Option<&Locator>,
    ) -> Result<Vec<Instance>> {
        let raw = self
            .rpc
            .call_paged(
                "DescribeInstances",
                &describe_params(region, filter),
                INSTANCE_PAGES,
                |resp: DescribeInstancesResponse| (resp.instances.items, resp.total_count),
            )
            .await?;
        Ok(raw.into_iter().map(Instance::from).collect())
    }

    async fn create_instance(
        &self,
        region: &str,
        subnet_id: &str,
        spec: &LaunchSpec,
    ) -> Result<String> {
        let result: Result<CreateInstanceResponse> = self
            .rpc
            .call("CreateInstance", create_params(region, subnet_id, spec))
            .await;
        match result {
            Ok(resp) => Ok(resp.instance_id),
            Err(e) if is_dry_run_pass(&e) => {
                debug!(name = %spec.name, "dry run passed");
                Err(ReconcileError::DryRunPassed.into())
            }
            Err(e) => Err(e),
        }
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        let _: Empty = self
            .rpc
            .call("StartInstance", instance_params(id))
            .await?;
        Ok(())
    }

    async fn stop_instance(&self, id: &str, force: bool) -> Result<()> {
        let mut p = instance_params(id);
        p.insert("ForceStop".to_string(), force.to_string());
        let _: Empty = self.rpc.call("StopInstance", p).await?;
        Ok(())
    }

    async fn reboot_instance(&self, id: &str) -> Result<()> {
        let _: Empty = self
            .rpc
            .call("RebootInstance", instance_params(id))
            .await?;
        Ok(())
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        let _: Empty = self
            .rpc
            .call("DeleteInstance", instance_params(id))
            .await?;
        Ok(())
    }

    async fn allocate_public_address(&self, id: &str) -> Result<String> {
        let resp: AllocatePublicIpResponse = self
            .rpc
            .call("AllocatePublicIpAddress", instance_params(id))
            .await?;
        Ok(resp.ip_address)
    }
}

impl NetworkApi for AliyunEcs {
    async fn list_networks(&self, region: &str) -> Result<Vec<NetworkResource>> {
        let raw = self
            .rpc
            .call_paged(
                "DescribeVpcs",
                &params([("RegionId", region.to_string())]),
                NETWORK_PAGES,
                |resp: DescribeVpcsResponse| (resp.vpcs.items, resp.total_count),
            )
            .await?;
        Ok(raw.into_iter().map(|v| network_from(v, region)).collect())
    }

    async fn create_network(&self, region: &str, cidr: &str) -> Result<String> {
        let resp: CreateVpcResponse = self
            .rpc
            .call(
                "CreateVpc",
                params([
                    ("RegionId", region.to_string()),
                    ("CidrBlock", cidr.to_string()),
                ]),
            )
            .await?;
        Ok(resp.vpc_id)
    }

    async fn list_subnets(&self, region: &str) -> Result<Vec<NetworkResource>> {
        let raw = self
            .rpc
            .call_paged(
                "DescribeVSwitches",
                &params([("RegionId", region.to_string())]),
                NETWORK_PAGES,
                |resp: DescribeVSwitchesResponse| (resp.vswitches.items, resp.total_count),
            )
            .await?;
        Ok(raw.into_iter().map(|s| subnet_from(s, region)).collect())
    }

    async fn create_subnet(
        &self,
        region: &str,
        zone: &str,
        network_id: &str,
        cidr: &str,
    ) -> Result<String> {
        let resp: CreateVSwitchResponse = self
            .rpc
            .call(
                "CreateVSwitch",
                params([
                    ("RegionId", region.to_string()),
                    ("ZoneId", zone.to_string()),
                    ("VpcId", network_id.to_string()),
                    ("CidrBlock", cidr.to_string()),
                ]),
            )
            .await?;
        Ok(resp.vswitch_id)
    }
}
