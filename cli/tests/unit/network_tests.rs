//! Network prerequisite provisioning against the scripted provider.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use ecsup::application::services::Polling;
use ecsup::application::services::network::ensure_network;
use ecsup::domain::{NetworkError, ResourceStatus};

use crate::fakes::{FakeCloud, REGION, RecordingReporter, ZONE, network, subnet};

fn polling() -> Polling {
    Polling::new(Duration::from_millis(1), Some(Duration::from_secs(5)))
}

#[tokio::test]
async fn empty_region_gets_one_network_and_one_subnet() {
    let cloud = FakeCloud::new();
    let reporter = RecordingReporter::new();

    let ids = ensure_network(&cloud, &reporter, REGION, ZONE, &polling())
        .await
        .expect("network");

    assert_eq!(ids.network_id, "vpc-new1");
    assert_eq!(ids.subnet_id, "vsw-new1");
    assert_eq!(cloud.count("create_network"), 1);
    assert_eq!(cloud.count("create_subnet"), 1);
    assert_eq!(
        cloud.count("create_subnet cn-hongkong-b vpc-new1 172.16.0.0/24"),
        1
    );
    assert!(reporter.has("waiting for virtual network to become available"));
    assert!(reporter.has("success: network ready (vpc-new1 / vsw-new1)"));
}

#[tokio::test]
async fn existing_resources_are_reused() {
    let cloud = FakeCloud::with_network();
    let reporter = RecordingReporter::new();

    let ids = ensure_network(&cloud, &reporter, REGION, ZONE, &polling())
        .await
        .expect("network");

    assert_eq!(ids.network_id, "vpc-1");
    assert_eq!(ids.subnet_id, "vsw-1");
    assert_eq!(cloud.count("create"), 0);
}

#[tokio::test]
async fn subnet_in_another_zone_is_not_used_and_its_range_is_skipped() {
    let cloud = FakeCloud::new();
    cloud.add_network(network("vpc-1", ResourceStatus::Available));
    cloud.add_subnet(subnet(
        "vsw-c",
        "vpc-1",
        "cn-hongkong-c",
        ResourceStatus::Available,
        "172.16.0.0/24",
    ));
    let reporter = RecordingReporter::new();

    let ids = ensure_network(&cloud, &reporter, REGION, ZONE, &polling())
        .await
        .expect("network");

    assert_ne!(ids.subnet_id, "vsw-c");
    assert_eq!(
        cloud.count("create_subnet cn-hongkong-b vpc-1 172.16.1.0/24"),
        1
    );
}

#[tokio::test]
async fn pending_network_is_awaited_not_duplicated() {
    let cloud = FakeCloud::new();
    cloud.add_network(network("vpc-1", ResourceStatus::Pending));
    cloud.networks_stay_pending.set(true);
    let reporter = RecordingReporter::new();
    let polling = Polling::new(Duration::from_millis(2), Some(Duration::from_millis(40)));

    let err = ensure_network(&cloud, &reporter, REGION, ZONE, &polling)
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::TimedOut { .. }));
    assert_eq!(cloud.count("create_network"), 0);
}

#[tokio::test]
async fn accepted_create_that_never_appears_is_an_error() {
    let cloud = FakeCloud::new();
    cloud.lose_network_creates.set(true);
    let reporter = RecordingReporter::new();

    let err = ensure_network(&cloud, &reporter, REGION, ZONE, &polling())
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::NoUsableNetwork { .. }));
    assert_eq!(cloud.count("create_network"), 1);
}
