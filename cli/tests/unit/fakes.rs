//! Shared fakes for unit tests.
//!
//! `FakeCloud` simulates an eventually consistent provider: every accepted
//! request schedules status changes that take effect one listing at a time.
//! `RecordingReporter` captures progress events as plain strings.

#![allow(dead_code, clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use anyhow::{Result, bail};
use ecsup::application::ports::{InstanceApi, NetworkApi, ProgressReporter};
use ecsup::domain::{
    Instance, InstanceStatus, LaunchSpec, Locator, NetworkResource, OutputLine, ReconcileError,
    ResourceStatus,
};

pub const REGION: &str = "cn-hongkong";
pub const ZONE: &str = "cn-hongkong-b";
pub const ADDRESS: &str = "203.0.113.5";

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn instance(id: &str, name: &str, status: InstanceStatus, address: Option<&str>) -> Instance {
    Instance {
        id: id.to_string(),
        name: name.to_string(),
        region: REGION.to_string(),
        zone: ZONE.to_string(),
        instance_type: "ecs.t5-lc1m2.small".to_string(),
        status,
        public_address: address.map(String::from),
        created_at: "2019-05-20T08:00Z".to_string(),
    }
}

pub fn launch_spec(name: &str) -> LaunchSpec {
    LaunchSpec {
        name: name.to_string(),
        zone: ZONE.to_string(),
        instance_type: "ecs.t5-lc1m2.small".to_string(),
        image: "ubuntu_16_04_64_20G_alibase_20190513.vhd".to_string(),
        password: Some("secret".to_string()),
        key_pair_name: None,
        instance_charge_type: "PostPaid".to_string(),
        internet_charge_type: "PayByTraffic".to_string(),
        bandwidth_in: 5,
        bandwidth_out: 5,
        system_disk_category: "cloud_ssd".to_string(),
        system_disk_size: 20,
        dry_run: false,
    }
}

pub fn network(id: &str, status: ResourceStatus) -> NetworkResource {
    NetworkResource {
        id: id.to_string(),
        region: REGION.to_string(),
        zone: None,
        network_id: None,
        status,
        cidr: "172.16.0.0/12".to_string(),
    }
}

pub fn subnet(id: &str, network_id: &str, zone: &str, status: ResourceStatus, cidr: &str) -> NetworkResource {
    NetworkResource {
        id: id.to_string(),
        region: REGION.to_string(),
        zone: Some(zone.to_string()),
        network_id: Some(network_id.to_string()),
        status,
        cidr: cidr.to_string(),
    }
}

// ── FakeCloud ────────────────────────────────────────────────────────────────

struct Simulated {
    instance: Instance,
    /// Statuses applied after each listing, front first.
    upcoming: VecDeque<InstanceStatus>,
    /// Listings that still omit this instance.
    hidden_for: u32,
    /// Remove the instance once `upcoming` drains.
    vanish: bool,
}

/// Scripted provider. Interior mutability keeps the port methods `&self`.
#[derive(Default)]
pub struct FakeCloud {
    world: RefCell<Vec<Simulated>>,
    networks: RefCell<Vec<NetworkResource>>,
    subnets: RefCell<Vec<NetworkResource>>,
    /// Every port call, in order, e.g. `"create build-01"`.
    pub calls: RefCell<Vec<String>>,
    /// Fail this many upcoming `list_instances` calls.
    pub list_failures: Cell<u32>,
    /// Reject this many upcoming mutating instance requests.
    pub reject_requests: Cell<u32>,
    /// Listings a newly created instance stays invisible for.
    pub create_lag: Cell<u32>,
    /// When set, allocation never assigns an address.
    pub withhold_address: Cell<bool>,
    /// When set, created networks and subnets never become available.
    pub networks_stay_pending: Cell<bool>,
    /// When set, network creates are accepted but nothing ever appears.
    pub lose_network_creates: Cell<bool>,
    next_id: Cell<u32>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that already has a usable network and subnet in [`ZONE`].
    pub fn with_network() -> Self {
        let cloud = Self::default();
        cloud.networks.borrow_mut().push(network("vpc-1", ResourceStatus::Available));
        cloud.subnets.borrow_mut().push(subnet(
            "vsw-1",
            "vpc-1",
            ZONE,
            ResourceStatus::Available,
            "172.16.0.0/24",
        ));
        cloud
    }

    pub fn add_instance(&self, instance: Instance) {
        self.world.borrow_mut().push(Simulated {
            instance,
            upcoming: VecDeque::new(),
            hidden_for: 0,
            vanish: false,
        });
    }

    pub fn add_network(&self, resource: NetworkResource) {
        self.networks.borrow_mut().push(resource);
    }

    pub fn add_subnet(&self, resource: NetworkResource) {
        self.subnets.borrow_mut().push(resource);
    }

    /// Calls whose text starts with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn status_of(&self, id: &str) -> Option<InstanceStatus> {
        self.world
            .borrow()
            .iter()
            .find(|s| s.instance.id == id)
            .map(|s| s.instance.status)
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn maybe_reject(&self, what: &str) -> Result<()> {
        let left = self.reject_requests.get();
        if left > 0 {
            self.reject_requests.set(left - 1);
            bail!("{what} rejected: IncorrectInstanceStatus");
        }
        Ok(())
    }

    fn schedule(&self, id: &str, statuses: &[InstanceStatus], vanish: bool) -> Result<()> {
        let mut world = self.world.borrow_mut();
        let Some(sim) = world.iter_mut().find(|s| s.instance.id == id) else {
            bail!("InvalidInstanceId.NotFound: {id}");
        };
        sim.upcoming = statuses.iter().copied().collect();
        sim.vanish = vanish;
        Ok(())
    }

    /// Apply one step of every scheduled transition.
    fn advance(&self) {
        let mut world = self.world.borrow_mut();
        for sim in world.iter_mut() {
            if sim.hidden_for > 0 {
                sim.hidden_for -= 1;
                continue;
            }
            if let Some(next) = sim.upcoming.pop_front() {
                sim.instance.status = next;
            }
        }
        world.retain(|s| !(s.vanish && s.upcoming.is_empty()));
    }

    fn advance_networks(resources: &RefCell<Vec<NetworkResource>>, stay_pending: bool) {
        if stay_pending {
            return;
        }
        for r in resources.borrow_mut().iter_mut() {
            if r.status == ResourceStatus::Pending {
                r.status = ResourceStatus::Available;
            }
        }
    }
}

impl InstanceApi for FakeCloud {
    async fn list_instances(&self, region: &str, filter: Option<&Locator>) -> Result<Vec<Instance>> {
        self.record(format!("list {region}"));
        let failures = self.list_failures.get();
        if failures > 0 {
            self.list_failures.set(failures - 1);
            bail!("ServiceUnavailable: try again later");
        }
        let snapshot = self
            .world
            .borrow()
            .iter()
            .filter(|s| s.hidden_for == 0 && s.instance.region == region)
            .filter(|s| filter.is_none_or(|l| l.matches(&s.instance)))
            .map(|s| s.instance.clone())
            .collect();
        self.advance();
        Ok(snapshot)
    }

    async fn create_instance(&self, region: &str, subnet_id: &str, spec: &LaunchSpec) -> Result<String> {
        self.record(format!("create {} in {subnet_id}", spec.name));
        if spec.dry_run {
            return Err(ReconcileError::DryRunPassed.into());
        }
        self.maybe_reject("CreateInstance")?;
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let id = format!("i-new{n}");
        let mut created = instance(&id, &spec.name, InstanceStatus::Starting, None);
        created.region = region.to_string();
        created.zone.clone_from(&spec.zone);
        self.world.borrow_mut().push(Simulated {
            instance: created,
            upcoming: VecDeque::from([InstanceStatus::Starting, InstanceStatus::Running]),
            hidden_for: self.create_lag.get(),
            vanish: false,
        });
        Ok(id)
    }

    async fn start_instance(&self, id: &str) -> Result<()> {
        self.record(format!("start {id}"));
        self.maybe_reject("StartInstance")?;
        self.schedule(id, &[InstanceStatus::Starting, InstanceStatus::Running], false)
    }

    async fn stop_instance(&self, id: &str, force: bool) -> Result<()> {
        self.record(format!("stop {id} force={force}"));
        self.maybe_reject("StopInstance")?;
        self.schedule(id, &[InstanceStatus::Stopping, InstanceStatus::Stopped], false)
    }

    async fn reboot_instance(&self, id: &str) -> Result<()> {
        self.record(format!("reboot {id}"));
        self.maybe_reject("RebootInstance")?;
        self.schedule(
            id,
            &[InstanceStatus::Stopping, InstanceStatus::Starting, InstanceStatus::Running],
            false,
        )
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.record(format!("delete {id}"));
        self.maybe_reject("DeleteInstance")?;
        self.schedule(id, &[InstanceStatus::Stopped], true)
    }

    async fn allocate_public_address(&self, id: &str) -> Result<String> {
        self.record(format!("allocate {id}"));
        self.maybe_reject("AllocatePublicIpAddress")?;
        if self.withhold_address.get() {
            return Ok(String::new());
        }
        let mut world = self.world.borrow_mut();
        let sim = world
            .iter_mut()
            .find(|s| s.instance.id == id)
            .expect("allocate on a known instance");
        sim.instance.public_address = Some(ADDRESS.to_string());
        Ok(ADDRESS.to_string())
    }
}

impl NetworkApi for FakeCloud {
    async fn list_networks(&self, region: &str) -> Result<Vec<NetworkResource>> {
        self.record(format!("list_networks {region}"));
        let snapshot = self.networks.borrow().clone();
        Self::advance_networks(&self.networks, self.networks_stay_pending.get());
        Ok(snapshot)
    }

    async fn create_network(&self, region: &str, cidr: &str) -> Result<String> {
        self.record(format!("create_network {region} {cidr}"));
        let id = format!("vpc-new{}", self.networks.borrow().len() + 1);
        let mut created = network(&id, ResourceStatus::Pending);
        created.cidr = cidr.to_string();
        if !self.lose_network_creates.get() {
            self.networks.borrow_mut().push(created);
        }
        Ok(id)
    }

    async fn list_subnets(&self, region: &str) -> Result<Vec<NetworkResource>> {
        self.record(format!("list_subnets {region}"));
        let snapshot = self.subnets.borrow().clone();
        Self::advance_networks(&self.subnets, self.networks_stay_pending.get());
        Ok(snapshot)
    }

    async fn create_subnet(&self, _region: &str, zone: &str, network_id: &str, cidr: &str) -> Result<String> {
        self.record(format!("create_subnet {zone} {network_id} {cidr}"));
        let id = format!("vsw-new{}", self.subnets.borrow().len() + 1);
        if !self.lose_network_creates.get() {
            self.subnets
                .borrow_mut()
                .push(subnet(&id, network_id, zone, ResourceStatus::Pending, cidr));
        }
        Ok(id)
    }
}

// ── RecordingReporter ────────────────────────────────────────────────────────

/// Captures every progress event as `"<kind>: <message>"`.
#[derive(Default)]
pub struct RecordingReporter {
    pub events: RefCell<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, needle: &str) -> bool {
        self.events.borrow().iter().any(|e| e.contains(needle))
    }

    pub fn remote_lines(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| e.strip_prefix("remote "))
            .map(String::from)
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.events.borrow_mut().push(format!("step: {message}"));
    }

    fn success(&self, message: &str) {
        self.events.borrow_mut().push(format!("success: {message}"));
    }

    fn warn(&self, message: &str) {
        self.events.borrow_mut().push(format!("warn: {message}"));
    }

    fn waiting(&self, message: &str) {
        self.events.borrow_mut().push(format!("waiting: {message}"));
    }

    fn remote_output(&self, line: &OutputLine) {
        self.events
            .borrow_mut()
            .push(format!("remote {}: {}", line.stream, line.text));
    }
}
