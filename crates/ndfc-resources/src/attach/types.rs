//! Attachment configuration and wire types.

use ndfc_common::endpoints::{networks, vrfs};
use ndfc_common::validations::{
    validate_fabric_name, validate_ipv4_address, validate_not_empty, validate_object_name,
    validate_serial_number, validate_vlan_id,
};
use ndfc_common::{Endpoint, Keyed, NdfcError, NdfcResult, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::wire::{lenient_bool, lenient_u16, string_or_default};

/// Which kind of object is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachKind {
    /// VRF attachments
    Vrf,
    /// Network attachments
    Network,
}

impl AttachKind {
    /// Lowercase name used in diffs and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachKind::Vrf => "vrf",
            AttachKind::Network => "network",
        }
    }

    /// Field naming the object in attachment records.
    pub fn name_field(&self) -> &'static str {
        match self {
            AttachKind::Vrf => "vrfName",
            AttachKind::Network => "networkName",
        }
    }

    /// Field listing objects in a deploy request.
    pub fn names_field(&self) -> &'static str {
        match self {
            AttachKind::Vrf => "vrfNames",
            AttachKind::Network => "networkNames",
        }
    }

    /// Queries the attachments of `names` in `fabric`.
    pub fn attachments_endpoint(&self, fabric: &str, names: &[String]) -> Endpoint {
        match self {
            AttachKind::Vrf => vrfs::attachments(fabric, names),
            AttachKind::Network => networks::attachments(fabric, names),
        }
    }

    /// Posts attach and detach records.
    pub fn attach_endpoint(&self, fabric: &str) -> Endpoint {
        match self {
            AttachKind::Vrf => vrfs::attach(fabric),
            AttachKind::Network => networks::attach(fabric),
        }
    }

    /// Deploys attached objects.
    pub fn deploy_endpoint(&self, fabric: &str) -> Endpoint {
        match self {
            AttachKind::Vrf => vrfs::deploy(fabric),
            AttachKind::Network => networks::deploy(fabric),
        }
    }
}

impl fmt::Display for AttachKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One switch in an attachment config. Exactly one of `ip` and
/// `serial_number` identifies the switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchAttach {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    /// VLAN on this switch; unset uses the object's VLAN
    #[serde(default)]
    pub vlan: Option<u16>,
    /// Access or trunk ports (networks only)
    #[serde(default)]
    pub ports: Vec<String>,
    /// Extra switch configuration sent with the attachment
    #[serde(default)]
    pub freeform_config: Option<String>,
    /// Deploy after changing this switch; unset follows the entry's `deploy`
    #[serde(default)]
    pub deploy: Option<bool>,
}

impl SwitchAttach {
    /// Switch identifier as given by the user.
    pub fn switch(&self) -> &str {
        self.serial_number
            .as_deref()
            .or(self.ip.as_deref())
            .unwrap_or_default()
    }

    fn validate(&self, kind: AttachKind) -> NdfcResult<()> {
        match (&self.ip, &self.serial_number) {
            (Some(ip), None) => validate_ipv4_address("ip", ip)?,
            (None, Some(serial)) => validate_serial_number("serial_number", serial)?,
            _ => {
                return Err(NdfcError::invalid_config(
                    "switches",
                    "each switch needs exactly one of ip or serial_number",
                ))
            }
        }
        if let Some(vlan) = self.vlan {
            validate_vlan_id("vlan", vlan)?;
        }
        if kind == AttachKind::Vrf && !self.ports.is_empty() {
            return Err(NdfcError::invalid_config(
                "ports",
                "ports apply to network attachments only",
            ));
        }
        for port in &self.ports {
            validate_not_empty("ports", port)?;
        }
        Ok(())
    }
}

/// Attachments of one VRF or network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachConfig {
    pub fabric: String,
    /// VRF or network name
    #[serde(alias = "vrf_name", alias = "network_name")]
    pub name: String,
    #[serde(default)]
    pub switches: Vec<SwitchAttach>,
    /// Deploy the object after changing its attachments; switches may
    /// override this
    #[serde(default)]
    pub deploy: bool,
}

impl AttachConfig {
    pub fn new(fabric: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fabric: fabric.into(),
            name: name.into(),
            switches: Vec::new(),
            deploy: false,
        }
    }

    pub fn validate(&self, kind: AttachKind, state: State) -> NdfcResult<()> {
        validate_fabric_name("fabric", &self.fabric)?;
        validate_object_name("name", &self.name)?;
        if self.switches.is_empty() && matches!(state, State::Merged | State::Replaced) {
            return Err(NdfcError::invalid_config(
                "switches",
                format!("state {} needs at least one switch", state),
            ));
        }
        for switch in &self.switches {
            switch.validate(kind)?;
        }
        Ok(())
    }
}

/// One object attached to one switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub fabric: String,
    pub name: String,
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    /// Sorted, without duplicates
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform_config: Option<String>,
}

impl Keyed for Attachment {
    fn key(&self) -> String {
        attachment_key(&self.fabric, &self.name, &self.serial_number)
    }
}

impl Attachment {
    /// Object key, without the switch.
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.fabric, self.name)
    }

    /// Builds a `lanAttachList` entry.
    ///
    /// `deployment` is true to attach and false to detach. For networks,
    /// `detach_ports` lists ports to remove from the attachment.
    pub fn lan_attach(&self, kind: AttachKind, deployment: bool, detach_ports: &[String]) -> Value {
        let mut entry = json!({
            "fabric": self.fabric,
            kind.name_field(): self.name,
            "serialNumber": self.serial_number,
            "vlan": self.vlan.unwrap_or(0),
            "deployment": deployment,
            "freeformConfig": self.freeform_config.clone().unwrap_or_default(),
            "instanceValues": "",
            "extensionValues": "",
        });
        if kind == AttachKind::Network {
            let ports = if deployment {
                self.ports.join(",")
            } else {
                String::new()
            };
            entry["switchPorts"] = Value::String(ports);
            entry["detachSwitchPorts"] = Value::String(detach_ports.join(","));
            entry["torPorts"] = Value::String(String::new());
        }
        entry
    }
}

/// Joins fabric, object and serial number into a `have` key.
pub fn attachment_key(fabric: &str, name: &str, serial: &str) -> String {
    format!("{}/{}/{}", fabric, name, serial)
}

/// Sorts and deduplicates port names.
pub fn normalize_ports(ports: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut ports: Vec<String> = ports.into_iter().collect();
    ports.sort();
    ports.dedup();
    ports
}

/// One entry of an attachment query reply.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLanAttach {
    #[serde(default, deserialize_with = "string_or_default")]
    pub switch_serial_no: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_lan_attached: bool,
    #[serde(default, deserialize_with = "lenient_u16")]
    pub vlan_id: Option<u16>,
    #[serde(default, deserialize_with = "string_or_default")]
    pub port_names: String,
    /// Absent when the controller does not report it
    #[serde(default)]
    pub freeform_config: Option<String>,
}

/// Empty freeform configuration is no freeform configuration.
pub fn normalize_freeform(config: Option<String>) -> Option<String> {
    config.filter(|text| !text.trim().is_empty())
}
