//! VRF and network reconciliation against a scripted controller.

use ndfc_common::endpoints::{networks, vrfs};
use ndfc_common::{Reconciler, State, Verb};
use ndfc_resources::network::{NetworkConfig, NetworkMgr};
use ndfc_resources::vrf::{VrfConfig, VrfMgr};
use ndfc_test::top_down_fixtures::{network_entry, vrf_entry};
use ndfc_test::{rest_send, MockController, RequestVerifier};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

fn vrf(name: &str, vni: u32) -> VrfConfig {
    VrfConfig {
        vrf_id: Some(vni),
        vlan_id: Some(2001),
        ..VrfConfig::new("f1", name)
    }
}

fn vrf_config_reply(name: &str, vni: u32) -> Value {
    json!({
        "vrfName": name,
        "vrfSegmentId": vni,
        "vrfVlanId": 2001,
        "mtu": 9216,
        "tag": 12345,
        "vrfRouteMap": "FABRIC-RMAP-REDIST-SUBNET",
        "maxBgpPaths": 1,
        "maxIbgpPaths": 2,
        "ipv6LinkLocalFlag": "true",
        "advertiseHostRouteFlag": "false",
        "advertiseDefaultRouteFlag": "true",
        "configureStaticDefaultRouteFlag": "true",
        "routeTargetBoth": "false",
        "vrfVlanName": "",
        "vrfDescription": "",
        "vrfIntfDescription": "",
        "nveId": 1,
    })
}

fn parse_template(body: &Value, field: &str) -> Value {
    serde_json::from_str(body[field].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_vrf_merged_create_fills_defaults() {
    let mock = Arc::new(MockController::new());
    mock.ok(&vrfs::list("f1"), json!([]));
    mock.ok(&vrfs::create("f1"), json!({}));

    let mut mgr = VrfMgr::new(rest_send(&mock), State::Merged, vec![vrf("vrf_1", 50001)]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock).sent(&vrfs::create("f1")).unwrap();
    assert_eq!(payloads[0]["vrfName"], "vrf_1");
    assert_eq!(payloads[0]["vrfId"], 50001);
    let config = parse_template(&payloads[0], "vrfTemplateConfig");
    assert_eq!(config["vrfSegmentId"], "50001");
    assert_eq!(config["mtu"], "9216");
    assert_eq!(config["vrfRouteMap"], "FABRIC-RMAP-REDIST-SUBNET");
}

#[tokio::test]
async fn test_vrf_merged_matching_have_is_idempotent() {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &vrfs::list("f1"),
        json!([vrf_entry("f1", "vrf_1", 50001, vrf_config_reply("vrf_1", 50001))]),
    );

    let mut mgr = VrfMgr::new(rest_send(&mock), State::Merged, vec![vrf("vrf_1", 50001)]);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock).no_writes().unwrap();
}

#[tokio::test]
async fn test_vrf_merged_update_keeps_unset_parameters() {
    let mock = Arc::new(MockController::new());
    let mut have_config = vrf_config_reply("vrf_1", 50001);
    have_config["mtu"] = json!(1500);
    mock.ok(
        &vrfs::list("f1"),
        json!([vrf_entry("f1", "vrf_1", 50001, have_config)]),
    );
    mock.ok(&vrfs::update("f1", "vrf_1"), json!({}));

    let config = VrfConfig {
        vrf_description: Some("tenant one".to_string()),
        ..vrf("vrf_1", 50001)
    };
    let mut mgr = VrfMgr::new(rest_send(&mock), State::Merged, vec![config]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&vrfs::update("f1", "vrf_1"))
        .unwrap();
    let sent = parse_template(&payloads[0], "vrfTemplateConfig");
    assert_eq!(sent["vrfDescription"], "tenant one");
    assert_eq!(sent["mtu"], "1500");
}

#[tokio::test]
async fn test_vrf_deleted_whole_fabric() {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &vrfs::list("f1"),
        json!([
            vrf_entry("f1", "vrf_1", 50001, vrf_config_reply("vrf_1", 50001)),
            vrf_entry("f1", "vrf_2", 50002, vrf_config_reply("vrf_2", 50002)),
        ]),
    );
    let names = vec!["vrf_1".to_string(), "vrf_2".to_string()];
    mock.ok(&vrfs::bulk_delete("f1", &names), json!({}));

    let mut mgr = VrfMgr::new(rest_send(&mock), State::Deleted, vec![VrfConfig::new("f1", "")]);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock)
        .sent_times(&vrfs::bulk_delete("f1", &names), 1)
        .unwrap();
    assert!(mgr.results().changed());
}

#[tokio::test]
async fn test_vrf_overridden_deletes_before_create() {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &vrfs::list("f1"),
        json!([vrf_entry("f1", "vrf_old", 50001, vrf_config_reply("vrf_old", 50001))]),
    );
    let old = vec!["vrf_old".to_string()];
    mock.ok(&vrfs::bulk_delete("f1", &old), json!({}));
    mock.ok(&vrfs::create("f1"), json!({}));

    let mut mgr = VrfMgr::new(rest_send(&mock), State::Overridden, vec![vrf("vrf_new", 50001)]);
    mgr.reconcile().await.unwrap();

    let writes: Vec<Verb> = mock
        .requests()
        .into_iter()
        .filter(|r| r.verb != Verb::Get)
        .map(|r| r.verb)
        .collect();
    assert_eq!(writes, vec![Verb::Delete, Verb::Post]);
}

#[tokio::test]
async fn test_vrf_query_named() {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &vrfs::list("f1"),
        json!([
            vrf_entry("f1", "vrf_1", 50001, vrf_config_reply("vrf_1", 50001)),
            vrf_entry("f1", "vrf_2", 50002, vrf_config_reply("vrf_2", 50002)),
        ]),
    );

    let mut mgr = VrfMgr::new(rest_send(&mock), State::Query, vec![VrfConfig::new("f1", "vrf_2")]);
    mgr.reconcile().await.unwrap();

    assert_eq!(mgr.results().len(), 1);
    assert_eq!(mgr.results().diff()[0]["payload"]["vrfName"], "vrf_2");
}

fn network(name: &str, vni: u32) -> NetworkConfig {
    NetworkConfig {
        network_id: Some(vni),
        vlan_id: Some(3001),
        vrf_name: Some("vrf_1".to_string()),
        gateway_ip_address: Some("10.10.10.1/24".to_string()),
        ..NetworkConfig::new("f1", name)
    }
}

#[tokio::test]
async fn test_network_merged_create() {
    let mock = Arc::new(MockController::new());
    mock.ok(&networks::list("f1"), json!([]));
    mock.ok(&networks::create("f1"), json!({}));

    let mut mgr = NetworkMgr::new(rest_send(&mock), State::Merged, vec![network("net_1", 30001)]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&networks::create("f1"))
        .unwrap();
    assert_eq!(payloads[0]["networkName"], "net_1");
    assert_eq!(payloads[0]["vrf"], "vrf_1");
    let config = parse_template(&payloads[0], "networkTemplateConfig");
    assert_eq!(config["gatewayIpAddress"], "10.10.10.1/24");
    assert_eq!(config["vlanId"], "3001");
    assert_eq!(config["suppressArp"], "false");
}

#[tokio::test]
async fn test_network_replaced_resets_unset_parameters() {
    let mock = Arc::new(MockController::new());
    mock.ok(
        &networks::list("f1"),
        json!([network_entry(
            "f1",
            "net_1",
            30001,
            "vrf_1",
            json!({
                "networkName": "net_1",
                "segmentId": 30001,
                "vlanId": 3001,
                "vrfName": "vrf_1",
                "gatewayIpAddress": "10.10.10.1/24",
                "mtu": 1500,
                "suppressArp": "true",
            }),
        )]),
    );
    mock.ok(&networks::update("f1", "net_1"), json!({}));

    let mut mgr = NetworkMgr::new(rest_send(&mock), State::Replaced, vec![network("net_1", 30001)]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&networks::update("f1", "net_1"))
        .unwrap();
    let sent = parse_template(&payloads[0], "networkTemplateConfig");
    assert_eq!(sent["mtu"], "9216");
    assert_eq!(sent["suppressArp"], "false");
}

#[tokio::test]
async fn test_network_layer2_without_vrf() {
    let mock = Arc::new(MockController::new());
    mock.ok(&networks::list("f1"), json!([]));
    mock.ok(&networks::create("f1"), json!({}));

    let config = NetworkConfig {
        network_id: Some(30002),
        is_layer2_only: Some(true),
        ..NetworkConfig::new("f1", "l2_net")
    };
    let mut mgr = NetworkMgr::new(rest_send(&mock), State::Merged, vec![config]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&networks::create("f1"))
        .unwrap();
    assert_eq!(payloads[0]["vrf"], "NA");
}

#[tokio::test]
async fn test_vrf_listed_twice_is_created_once() {
    let mock = Arc::new(MockController::new());
    mock.ok(&vrfs::list("f1"), json!([]));
    mock.ok(&vrfs::create("f1"), json!({}));

    let config = vec![vrf("vrf_1", 50001), vrf("vrf_1", 50001)];
    let mut mgr = VrfMgr::new(rest_send(&mock), State::Merged, config);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock)
        .sent_times(&vrfs::create("f1"), 1)
        .unwrap();
}

#[tokio::test]
async fn test_vrf_listed_twice_with_different_settings() {
    let mock = Arc::new(MockController::new());
    mock.ok(&vrfs::list("f1"), json!([]));

    let config = vec![vrf("vrf_1", 50001), vrf("vrf_1", 50002)];
    let mut mgr = VrfMgr::new(rest_send(&mock), State::Merged, config);
    assert!(mgr.reconcile().await.is_err());

    RequestVerifier::new(&mock).no_writes().unwrap();
}
