//! Bootflash, maintenance mode and discovery against a scripted controller.

use ndfc_common::endpoints::{bootflash, fabrics};
use ndfc_common::{Reconciler, State, Verb};
use ndfc_resources::bootflash::{BootflashConfig, BootflashInfo, BootflashMgr, BootflashTarget};
use ndfc_resources::discovery::{DiscoverConfig, DiscoveryMgr};
use ndfc_resources::maintenance_mode::{MaintenanceModeConfig, MaintenanceModeMgr, Mode};
use ndfc_test::discovery_fixtures::reachable_switch;
use ndfc_test::image_fixtures::{bootflash_file, bootflash_info};
use ndfc_test::inventory_fixtures::switch_entry;
use ndfc_test::{rest_send, MockController, RequestVerifier};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn controller() -> Arc<MockController> {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &fabrics::switches_by_fabric("f1"),
        json!([
            switch_entry("10.1.1.1", "FDO1", "f1", "Normal"),
            switch_entry("10.1.1.2", "FDO2", "f1", "Maintenance"),
        ]),
    );
    mock
}

fn with_bootflash(mock: &MockController) {
    mock.ok(
        &bootflash::info("FDO1"),
        bootflash_info(
            "bootflash:",
            vec![
                bootflash_file("FDO1", "bootflash:", "nxos64-cs.10.2.5.M.bin", 1_900_000_000),
                bootflash_file("FDO1", "bootflash:", "nxos64-cs.10.3.1.F.bin", 2_000_000_000),
                bootflash_file("FDO1", "bootflash:", "config.cfg", 4096),
            ],
        ),
    );
}

fn target(switch: &str, filename: &str) -> BootflashTarget {
    BootflashTarget {
        switch: switch.to_string(),
        filepath: "bootflash:".to_string(),
        filename: filename.to_string(),
    }
}

#[tokio::test]
async fn test_bootflash_query() {
    let mock = controller();
    with_bootflash(&mock);

    let info = BootflashInfo::query(&rest_send(&mock), "FDO1").await.unwrap();
    assert_eq!(info.files().len(), 3);
    assert_eq!(info.files()[2].size, "4096");
    assert_eq!(info.files()[0].partition, "bootflash:");
}

#[tokio::test]
async fn test_bootflash_delete_glob() {
    let mock = controller();
    with_bootflash(&mock);
    mock.ok(&bootflash::delete_files(), json!({}));

    let config = BootflashConfig {
        fabric: Some("f1".to_string()),
        targets: vec![target("10.1.1.1", "nxos64-cs.*.bin")],
    };
    let mut mgr = BootflashMgr::new(rest_send(&mock), State::Deleted, config);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&bootflash::delete_files())
        .unwrap();
    let files = payloads[0]["deleteFiles"][0]["files"].as_array().unwrap();
    assert_eq!(payloads[0]["deleteFiles"][0]["serialNumber"], "FDO1");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["fileName"], "nxos64-cs.10.2.5.M.bin");
    assert_eq!(files[0]["filePath"], "bootflash:");
}

#[tokio::test]
async fn test_bootflash_absent_files_are_a_no_op() {
    let mock = controller();
    with_bootflash(&mock);

    let config = BootflashConfig {
        fabric: Some("f1".to_string()),
        targets: vec![target("FDO1", "*.tar")],
    };
    let mut mgr = BootflashMgr::new(rest_send(&mock), State::Deleted, config);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock).no_writes().unwrap();
    assert!(mgr.results().is_empty());
}

#[tokio::test]
async fn test_bootflash_empty_targets() {
    let mock = controller();

    let mut mgr = BootflashMgr::new(rest_send(&mock), State::Deleted, BootflashConfig::default());
    mgr.reconcile().await.unwrap();

    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_maintenance_mode_changes_and_deploys() {
    let mock = controller();
    let enable = fabrics::maintenance_mode("f1", "FDO1", true);
    let deploy = fabrics::config_deploy_switches("f1", &["FDO1".to_string()]);
    mock.ok(&enable, json!({}));
    mock.ok(&deploy, json!({}));

    let config = vec![
        MaintenanceModeConfig {
            deploy: true,
            ..MaintenanceModeConfig::new("f1", "10.1.1.1", Mode::Maintenance)
        },
        MaintenanceModeConfig::new("f1", "10.1.1.2", Mode::Maintenance),
    ];
    let mut mgr = MaintenanceModeMgr::new(rest_send(&mock), State::Merged, config);
    mgr.reconcile().await.unwrap();

    let verifier = RequestVerifier::new(&mock);
    verifier.sent_times(&enable, 1).unwrap();
    verifier.sent_times(&deploy, 1).unwrap();
    verifier
        .not_sent(&fabrics::maintenance_mode("f1", "FDO2", true))
        .unwrap();
}

#[tokio::test]
async fn test_maintenance_mode_back_to_normal_uses_delete() {
    let mock = controller();
    let disable = fabrics::maintenance_mode("f1", "FDO2", false);
    mock.ok(&disable, json!({}));

    let config = vec![MaintenanceModeConfig::new("f1", "10.1.1.2", Mode::Normal)];
    let mut mgr = MaintenanceModeMgr::new(rest_send(&mock), State::Merged, config);
    mgr.reconcile().await.unwrap();

    assert_eq!(disable.verb, Verb::Delete);
    RequestVerifier::new(&mock).sent_times(&disable, 1).unwrap();
}

#[tokio::test]
async fn test_maintenance_mode_query() {
    let mock = controller();

    let config = vec![MaintenanceModeConfig::new("f1", "10.1.1.2", Mode::Normal)];
    let mut mgr = MaintenanceModeMgr::new(rest_send(&mock), State::Query, config);
    mgr.reconcile().await.unwrap();

    let payload = &mgr.results().diff()[0]["payload"];
    assert_eq!(payload["serial"], "FDO2");
    assert_eq!(payload["mode"], "maintenance");
    assert_eq!(payload["system_mode"], "maintenance");
}

#[tokio::test]
async fn test_discover_only_new_switches() {
    let mock = controller();
    mock.ok(
        &fabrics::test_reachability("f1"),
        json!([
            reachable_switch("10.1.1.1", "FDO1", true),
            reachable_switch("10.1.1.3", "FDO3", true),
            reachable_switch("10.1.1.4", "FDO4", false),
        ]),
    );
    mock.ok(&fabrics::discover("f1"), json!({}));

    let config = vec![DiscoverConfig::new("f1", "10.1.1.3", "admin", "secret")];
    let mut mgr = DiscoveryMgr::new(rest_send(&mock), State::Merged, config);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&fabrics::discover("f1"))
        .unwrap();
    let switches = payloads[0]["switches"].as_array().unwrap();
    assert_eq!(switches.len(), 1);
    assert_eq!(switches[0]["serialNumber"], "FDO3");
    assert_eq!(payloads[0]["seedIP"], "10.1.1.3");

    // The password never lands in the results
    assert!(mgr.results().diff()[0]["payload"].get("password").is_none());
}

#[tokio::test]
async fn test_discover_nothing_new() {
    let mock = controller();
    mock.ok(
        &fabrics::test_reachability("f1"),
        json!([reachable_switch("10.1.1.1", "FDO1", true)]),
    );

    let config = vec![DiscoverConfig::new("f1", "10.1.1.1", "admin", "secret")];
    let mut mgr = DiscoveryMgr::new(rest_send(&mock), State::Merged, config);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock)
        .not_sent(&fabrics::discover("f1"))
        .unwrap();
    assert!(!mgr.results().changed());
}

#[tokio::test]
async fn test_discover_ignores_blank_inventory_fields() {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &fabrics::switches_by_fabric("f1"),
        json!([switch_entry("", "", "f1", "Normal")]),
    );

    // In check mode the seed is reported without a serial number
    let rest = rest_send(&mock).with_check_mode(true);
    let config = vec![DiscoverConfig::new("f1", "10.1.1.3", "admin", "secret")];
    let mut mgr = DiscoveryMgr::new(rest, State::Merged, config);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock).no_writes().unwrap();
    assert!(mgr.results().changed());
    assert_eq!(mgr.results().diff()[0]["action"], "discover");
}
