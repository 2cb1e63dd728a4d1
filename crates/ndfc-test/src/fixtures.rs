//! Fixtures for common controller replies
//!
//! Each builder returns the JSON the controller sends for one object, in
//! the controller's own field naming.

use crate::MockController;
use ndfc_common::RestSend;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// RestSend over a mock controller that never sleeps between retries.
pub fn rest_send(mock: &Arc<MockController>) -> RestSend {
    RestSend::new(mock.clone())
        .with_timeout(Duration::from_secs(10))
        .with_send_interval(Duration::from_secs(1))
        .with_unit_test(true)
}

/// Fabric list replies
pub mod fabric_fixtures {
    use super::*;

    /// A fabric as listed by `GET /fabrics`
    pub fn fabric_entry(name: &str, template: &str, nv_pairs: Value) -> Value {
        json!({
            "id": 1,
            "fabricId": "FABRIC-1",
            "fabricName": name,
            "fabricType": "Switch_Fabric",
            "templateName": template,
            "nvPairs": nv_pairs,
        })
    }

    /// Easy_Fabric with the usual parameters
    pub fn easy_fabric(name: &str, bgp_as: &str) -> Value {
        fabric_entry(
            name,
            "Easy_Fabric",
            json!({
                "FABRIC_NAME": name,
                "FABRIC_TYPE": "Switch_Fabric",
                "BGP_AS": bgp_as,
                "REPLICATION_MODE": "Multicast",
                "ANYCAST_GW_MAC": "2020.0000.00aa",
                "UNDERLAY_IS_V6": "false",
                "SITE_ID": bgp_as,
            }),
        )
    }
}

/// Inventory replies
pub mod inventory_fixtures {
    use super::*;

    /// A switch as listed by `GET /inventory/switchesByFabric`
    pub fn switch_entry(ip: &str, serial: &str, fabric: &str, mode: &str) -> Value {
        json!({
            "ipAddress": ip,
            "serialNumber": serial,
            "logicalName": format!("leaf-{}", serial.to_lowercase()),
            "model": "N9K-C93180YC-EX",
            "release": "10.3(3)",
            "mode": mode,
            "systemMode": mode,
            "fabricName": fabric,
            "switchRole": "leaf",
            "managable": true,
        })
    }
}

/// VRF and network replies
pub mod top_down_fixtures {
    use super::*;

    /// A VRF as listed by `GET /top-down/fabrics/{fabric}/vrfs`
    pub fn vrf_entry(fabric: &str, name: &str, vrf_id: u32, template_config: Value) -> Value {
        json!({
            "id": 10,
            "fabric": fabric,
            "vrfName": name,
            "vrfId": vrf_id,
            "vrfTemplate": "Default_VRF_Universal",
            "vrfExtensionTemplate": "Default_VRF_Extension_Universal",
            "vrfTemplateConfig": template_config.to_string(),
            "vrfStatus": "DEPLOYED",
            "tenantName": null,
        })
    }

    /// A network as listed by `GET /top-down/fabrics/{fabric}/networks`
    pub fn network_entry(
        fabric: &str,
        name: &str,
        network_id: u32,
        vrf: &str,
        template_config: Value,
    ) -> Value {
        json!({
            "id": 20,
            "fabric": fabric,
            "networkName": name,
            "networkId": network_id,
            "networkTemplate": "Default_Network_Universal",
            "networkExtensionTemplate": "Default_Network_Extension_Universal",
            "vrf": vrf,
            "networkTemplateConfig": template_config.to_string(),
            "networkStatus": "DEPLOYED",
        })
    }

    /// One switch attachment as returned by the attachments query
    pub fn lan_attach(
        name_key: &str,
        name: &str,
        serial: &str,
        attached: bool,
        vlan: u16,
        ports: &str,
    ) -> Value {
        json!({
            name_key: name,
            "fabricName": "f1",
            "switchSerialNo": serial,
            "switchName": format!("leaf-{}", serial.to_lowercase()),
            "ipAddress": "",
            "isLanAttached": attached,
            "lanAttachState": if attached { "DEPLOYED" } else { "NA" },
            "vlanId": vlan,
            "portNames": ports,
        })
    }

    /// Attachments of one VRF: `(serial, attached, vlan)`
    pub fn vrf_attachments(name: &str, switches: &[(&str, bool, u16)]) -> Value {
        let list: Vec<Value> = switches
            .iter()
            .map(|(serial, attached, vlan)| lan_attach("vrfName", name, serial, *attached, *vlan, ""))
            .collect();
        json!({"vrfName": name, "lanAttachList": list})
    }

    /// Attachments of one network: `(serial, attached, vlan, ports)`
    pub fn network_attachments(name: &str, switches: &[(&str, bool, u16, &str)]) -> Value {
        let list: Vec<Value> = switches
            .iter()
            .map(|(serial, attached, vlan, ports)| {
                lan_attach("networkName", name, serial, *attached, *vlan, ports)
            })
            .collect();
        json!({"networkName": name, "lanAttachList": list})
    }
}

/// Switch policy replies
pub mod policy_fixtures {
    use super::*;

    /// A policy as listed by `GET /policies/switches`
    pub fn policy_entry(
        policy_id: &str,
        serial: &str,
        template: &str,
        description: &str,
        nv_pairs: Value,
    ) -> Value {
        json!({
            "id": 100,
            "policyId": policy_id,
            "description": description,
            "serialNumber": serial,
            "entityType": "SWITCH",
            "entityName": "SWITCH",
            "templateName": template,
            "templateContentType": "TEMPLATE_CLI",
            "nvPairs": nv_pairs,
            "priority": 500,
            "source": "",
            "deleted": false,
        })
    }
}

/// Image management replies
pub mod image_fixtures {
    use super::*;

    /// An image policy as listed by `GET /policymgnt/policies`
    pub fn image_policy_entry(name: &str, platform: &str, release: &str, packages: &str) -> Value {
        json!({
            "policyName": name,
            "policyType": "PLATFORM",
            "nxosVersion": release,
            "packageName": packages,
            "platform": platform,
            "policyDescr": "",
            "platformPolicies": "",
            "epldImgName": "",
            "rpmimages": "",
            "imageName": "nxos64-cs.10.3.1.F.bin",
            "agnostic": "false",
            "ref_count": 0,
        })
    }

    /// The policy list envelope
    pub fn image_policy_list(entries: Vec<Value>) -> Value {
        json!({
            "status": "SUCCESS",
            "lastOperDataObject": entries,
            "message": "",
        })
    }

    /// One bootflash file: `(partition, filename, size)`
    pub fn bootflash_file(serial: &str, partition: &str, filename: &str, size: u64) -> Value {
        json!({
            "bootflash_type": "active",
            "date": "Jan 01 00:00:00 2024",
            "filename": filename,
            "filepath": format!("{}{}", partition, filename),
            "ip_addr": "172.22.150.105",
            "name": format!("leaf-{}", serial.to_lowercase()),
            "serial_number": serial,
            "size": size.to_string(),
        })
    }

    /// The bootflash-info reply for one switch
    pub fn bootflash_info(partition: &str, files: Vec<Value>) -> Value {
        json!({
            "bootFlashDataMap": { partition: files },
            "bootFlashSpaceMap": {
                partition: {
                    "bootflash_type": "active",
                    "freeSpace": 50_000_000_000u64,
                    "totalSpace": 60_000_000_000u64,
                    "usedSpace": 10_000_000_000u64,
                }
            },
            "partitions": [partition],
            "requiredSpace": "0 MB",
        })
    }
}

/// Discovery replies
pub mod discovery_fixtures {
    use super::*;

    /// One entry of the test-reachability reply
    pub fn reachable_switch(ip: &str, serial: &str, reachable: bool) -> Value {
        json!({
            "ipaddr": ip,
            "sysName": format!("leaf-{}", serial.to_lowercase()),
            "deviceIndex": format!("leaf-{}({})", serial.to_lowercase(), serial),
            "platform": "N9K-C93180YC-EX",
            "version": "10.3(3)",
            "serialNumber": serial,
            "vdcId": 0,
            "vdcMac": null,
            "reachable": reachable,
            "auth": reachable,
            "known": false,
            "valid": reachable,
            "selectable": reachable,
            "statusReason": if reachable { "manageable" } else { "unreachable" },
        })
    }
}
