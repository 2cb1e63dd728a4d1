//! Fabric reconciliation against a scripted controller.

use ndfc_common::endpoints::fabrics;
use ndfc_common::{NdfcError, Reconciler, State};
use ndfc_resources::fabric::{FabricConfig, FabricMgr, FabricTemplate, ReplicationMode};
use ndfc_test::fabric_fixtures::{easy_fabric, fabric_entry};
use ndfc_test::{rest_send, MockController, RequestVerifier};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn easy(name: &str) -> FabricConfig {
    FabricConfig {
        bgp_as: Some("65001".to_string()),
        ..FabricConfig::new(name)
    }
}

fn controller_with(fabrics_list: serde_json::Value) -> Arc<MockController> {
    let mock = Arc::new(MockController::new());
    mock.ok(&fabrics::list(), fabrics_list);
    mock
}

#[tokio::test]
async fn test_merged_creates_missing_fabric() {
    let mock = controller_with(json!([]));
    mock.ok(&fabrics::create("f1", "Easy_Fabric"), json!({}));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![easy("f1")]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&fabrics::create("f1", "Easy_Fabric"))
        .unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["FABRIC_NAME"], "f1");
    assert_eq!(payloads[0]["BGP_AS"], "65001");
    assert_eq!(payloads[0]["FABRIC_TYPE"], "Switch_Fabric");
    assert!(mgr.results().changed());
}

#[tokio::test]
async fn test_merged_existing_fabric_is_idempotent() {
    let mock = controller_with(json!([easy_fabric("f1", "65001")]));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![easy("f1")]);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock).no_writes().unwrap();
    assert!(!mgr.results().changed());
}

#[tokio::test]
async fn test_merged_updates_changed_nv_pairs() {
    let mock = controller_with(json!([easy_fabric("f1", "65001")]));
    mock.ok(&fabrics::update("f1", "Easy_Fabric"), json!({}));

    let config = FabricConfig {
        replication_mode: Some(ReplicationMode::Ingress),
        ..easy("f1")
    };
    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![config]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&fabrics::update("f1", "Easy_Fabric"))
        .unwrap();
    assert_eq!(payloads[0]["REPLICATION_MODE"], "Ingress");
    // Parameters the user did not set keep their controller values
    assert_eq!(payloads[0]["SITE_ID"], "65001");
}

#[tokio::test]
async fn test_merged_requires_bgp_as_to_create() {
    let mock = controller_with(json!([]));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![FabricConfig::new("f1")]);
    let err = mgr.reconcile().await.unwrap_err();

    assert!(matches!(err, NdfcError::InvalidConfig { .. }));
    RequestVerifier::new(&mock).no_writes().unwrap();
}

#[tokio::test]
async fn test_template_change_is_rejected() {
    let mock = controller_with(json!([easy_fabric("f1", "65001")]));

    let config = FabricConfig {
        template: FabricTemplate::LanClassic,
        ..FabricConfig::new("f1")
    };
    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![config]);
    assert!(mgr.reconcile().await.is_err());
}

#[tokio::test]
async fn test_deleted_only_existing_fabrics() {
    let mock = controller_with(json!([easy_fabric("f1", "65001")]));
    mock.ok(&fabrics::delete("f1"), json!({}));

    let config = vec![FabricConfig::new("f1"), FabricConfig::new("f2")];
    let mut mgr = FabricMgr::new(rest_send(&mock), State::Deleted, config);
    mgr.reconcile().await.unwrap();

    let verifier = RequestVerifier::new(&mock);
    verifier.sent_times(&fabrics::delete("f1"), 1).unwrap();
    verifier.not_sent(&fabrics::delete("f2")).unwrap();
    assert_eq!(mgr.results().diff()[0]["payload"], "f1");
}

#[tokio::test]
async fn test_query_reports_all_fabrics() {
    let mock = controller_with(json!([
        easy_fabric("f1", "65001"),
        easy_fabric("f2", "65002"),
    ]));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Query, vec![]);
    mgr.reconcile().await.unwrap();

    assert_eq!(mgr.results().len(), 2);
    assert!(!mgr.results().changed());
}

#[tokio::test]
async fn test_check_mode_sends_no_writes() {
    let mock = controller_with(json!([]));

    let rest = rest_send(&mock).with_check_mode(true);
    let mut mgr = FabricMgr::new(rest, State::Merged, vec![easy("f1")]);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock).no_writes().unwrap();
    assert_eq!(mgr.results().len(), 1);
}

#[tokio::test]
async fn test_config_deploy() {
    let mock = controller_with(json!([]));
    mock.ok(&fabrics::config_deploy("f1"), json!({"status": "Configuration deployment completed."}));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![FabricConfig::new("f1")]);
    mgr.config_deploy().await.unwrap();

    RequestVerifier::new(&mock)
        .sent_times(&fabrics::config_deploy("f1"), 1)
        .unwrap();
}

#[tokio::test]
async fn test_replaced_resets_unset_parameters_to_defaults() {
    let mock = controller_with(json!([fabric_entry(
        "f1",
        "Easy_Fabric",
        json!({
            "FABRIC_NAME": "f1",
            "FABRIC_TYPE": "Switch_Fabric",
            "BGP_AS": "65001",
            "REPLICATION_MODE": "Ingress",
            "ANYCAST_GW_MAC": "2020.0000.00aa",
            "UNDERLAY_IS_V6": "false",
            "SITE_ID": "65001",
        }),
    )]));
    mock.ok(&fabrics::update("f1", "Easy_Fabric"), json!({}));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Replaced, vec![easy("f1")]);
    mgr.reconcile().await.unwrap();

    let payloads = RequestVerifier::new(&mock)
        .sent(&fabrics::update("f1", "Easy_Fabric"))
        .unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0]["REPLICATION_MODE"], "Multicast");
    assert_eq!(payloads[0]["BGP_AS"], "65001");
    assert_eq!(mgr.results().diff()[0]["action"], "replace");
}

#[tokio::test]
async fn test_replaced_matching_fabric_is_idempotent() {
    let mock = controller_with(json!([easy_fabric("f1", "65001")]));

    let mut mgr = FabricMgr::new(rest_send(&mock), State::Replaced, vec![easy("f1")]);
    mgr.reconcile().await.unwrap();

    RequestVerifier::new(&mock).no_writes().unwrap();
    assert!(!mgr.results().changed());
}

#[tokio::test]
async fn test_save_and_deploy_after_update() {
    let mock = controller_with(json!([easy_fabric("f1", "65001")]));
    mock.ok(&fabrics::update("f1", "Easy_Fabric"), json!({}));
    mock.ok(&fabrics::config_save("f1"), json!({"status": "Config save is completed"}));
    mock.ok(&fabrics::config_deploy("f1"), json!({"status": "Configuration deployment completed."}));

    let config = FabricConfig {
        replication_mode: Some(ReplicationMode::Ingress),
        ..easy("f1")
    };
    let mut mgr = FabricMgr::new(rest_send(&mock), State::Merged, vec![config]);
    mgr.reconcile().await.unwrap();
    mgr.config_save().await.unwrap();
    mgr.config_deploy().await.unwrap();

    let verifier = RequestVerifier::new(&mock);
    verifier.sent_times(&fabrics::update("f1", "Easy_Fabric"), 1).unwrap();
    verifier.sent_times(&fabrics::config_save("f1"), 1).unwrap();
    verifier.sent_times(&fabrics::config_deploy("f1"), 1).unwrap();

    let actions: Vec<_> = mgr
        .results()
        .diff()
        .iter()
        .map(|d| d["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, vec!["update", "config_save", "config_deploy"]);
}
