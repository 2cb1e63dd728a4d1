//! Network configuration and payload types.

use ndfc_common::endpoints::networks;
use ndfc_common::validations::{
    validate_fabric_name, validate_ipv4_host, validate_ipv6_prefix, validate_mtu,
    validate_object_name, validate_vlan_id, validate_vni,
};
use ndfc_common::{Endpoint, Keyed, NdfcError, NdfcResult, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::top_down::{fill_defaults, object_key, retain_keys, TopDownConfig, TopDownObject};
use crate::wire::{self, lenient_u32, string_or_default};

/// Default network template.
pub const DEFAULT_NETWORK_TEMPLATE: &str = "Default_Network_Universal";
/// Default network extension template.
pub const DEFAULT_NETWORK_EXTENSION_TEMPLATE: &str = "Default_Network_Extension_Universal";
/// VRF name the controller reports for layer 2 only networks.
pub const LAYER2_VRF: &str = "NA";

/// Template parameters this client manages.
pub const TEMPLATE_KEYS: &[&str] = &[
    "networkName",
    "segmentId",
    "vlanId",
    "vlanName",
    "vrfName",
    "gatewayIpAddress",
    "gatewayIpV6Address",
    "mtu",
    "isLayer2Only",
    "suppressArp",
    "intfDescription",
    "tag",
];

const TEMPLATE_DEFAULTS: &[(&str, &str)] = &[
    ("vlanName", ""),
    ("gatewayIpAddress", ""),
    ("gatewayIpV6Address", ""),
    ("mtu", "9216"),
    ("isLayer2Only", "false"),
    ("suppressArp", "false"),
    ("intfDescription", ""),
    ("tag", "12345"),
];

fn default_network_template() -> String {
    DEFAULT_NETWORK_TEMPLATE.to_string()
}

fn default_network_extension_template() -> String {
    DEFAULT_NETWORK_EXTENSION_TEMPLATE.to_string()
}

/// User configuration for one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub fabric: String,
    #[serde(default)]
    pub network_name: String,
    /// Network VNI
    #[serde(default)]
    pub network_id: Option<u32>,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub vrf_name: Option<String>,
    /// IPv4 gateway with prefix length, e.g. `10.1.1.1/24`
    #[serde(default)]
    pub gateway_ip_address: Option<String>,
    #[serde(default)]
    pub gateway_ipv6_address: Option<String>,
    #[serde(default = "default_network_template")]
    pub network_template: String,
    #[serde(default = "default_network_extension_template")]
    pub network_extension_template: String,
    #[serde(default)]
    pub vlan_name: Option<String>,
    #[serde(default)]
    pub mtu: Option<u16>,
    #[serde(default)]
    pub is_layer2_only: Option<bool>,
    #[serde(default)]
    pub suppress_arp: Option<bool>,
    #[serde(default)]
    pub intf_description: Option<String>,
    #[serde(default)]
    pub tag: Option<u32>,
}

impl NetworkConfig {
    /// Creates a config for `fabric`/`network_name` with every optional
    /// field unset.
    pub fn new(fabric: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self {
            fabric: fabric.into(),
            network_name: network_name.into(),
            network_id: None,
            vlan_id: None,
            vrf_name: None,
            gateway_ip_address: None,
            gateway_ipv6_address: None,
            network_template: default_network_template(),
            network_extension_template: default_network_extension_template(),
            vlan_name: None,
            mtu: None,
            is_layer2_only: None,
            suppress_arp: None,
            intf_description: None,
            tag: None,
        }
    }

    fn layer2_only(&self) -> bool {
        self.is_layer2_only.unwrap_or(false)
    }

    /// VRF for the payload. Layer 2 only networks use the placeholder.
    fn vrf(&self) -> Option<String> {
        if self.layer2_only() {
            Some(LAYER2_VRF.to_string())
        } else {
            self.vrf_name.clone()
        }
    }
}

impl TopDownConfig for NetworkConfig {
    type Object = NetworkPayload;

    fn fabric(&self) -> &str {
        &self.fabric
    }

    fn name(&self) -> &str {
        &self.network_name
    }

    fn validate(&self, state: State) -> NdfcResult<()> {
        validate_fabric_name("fabric", &self.fabric)?;
        if self.network_name.is_empty() {
            return match state {
                State::Query | State::Deleted => Ok(()),
                _ => Err(NdfcError::invalid_config(
                    "network_name",
                    format!("required for state {}", state),
                )),
            };
        }
        validate_object_name("network_name", &self.network_name)?;
        if matches!(state, State::Query | State::Deleted) {
            return Ok(());
        }

        match self.network_id {
            Some(vni) => validate_vni("network_id", vni)?,
            None => {
                return Err(NdfcError::invalid_config(
                    "network_id",
                    format!("required for state {}", state),
                ))
            }
        }
        if !self.layer2_only() {
            match &self.vrf_name {
                Some(vrf) => validate_object_name("vrf_name", vrf)?,
                None => {
                    return Err(NdfcError::invalid_config(
                        "vrf_name",
                        "required unless is_layer2_only is true",
                    ))
                }
            }
        } else if self.gateway_ip_address.is_some() {
            return Err(NdfcError::invalid_config(
                "gateway_ip_address",
                "layer 2 only networks have no gateway",
            ));
        }
        if let Some(vlan) = self.vlan_id {
            validate_vlan_id("vlan_id", vlan)?;
        }
        if let Some(gw) = &self.gateway_ip_address {
            validate_ipv4_host("gateway_ip_address", gw)?;
        }
        if let Some(gw) = &self.gateway_ipv6_address {
            validate_ipv6_prefix("gateway_ipv6_address", gw)?;
        }
        if let Some(mtu) = self.mtu {
            validate_mtu("mtu", mtu)?;
        }
        Ok(())
    }

    fn to_object(&self) -> NetworkPayload {
        let mut config = BTreeMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                config.insert(key.to_string(), value);
            }
        };
        set("networkName", Some(self.network_name.clone()));
        set("segmentId", self.network_id.map(|v| v.to_string()));
        set("vlanId", self.vlan_id.map(|v| v.to_string()));
        set("vlanName", self.vlan_name.clone());
        set("vrfName", self.vrf());
        set("gatewayIpAddress", self.gateway_ip_address.clone());
        set("gatewayIpV6Address", self.gateway_ipv6_address.clone());
        set("mtu", self.mtu.map(|v| v.to_string()));
        set("isLayer2Only", self.is_layer2_only.map(|v| v.to_string()));
        set("suppressArp", self.suppress_arp.map(|v| v.to_string()));
        set("intfDescription", self.intf_description.clone());
        set("tag", self.tag.map(|v| v.to_string()));

        NetworkPayload {
            fabric: self.fabric.clone(),
            network_name: self.network_name.clone(),
            network_id: self.network_id,
            network_template: self.network_template.clone(),
            network_extension_template: self.network_extension_template.clone(),
            vrf: self.vrf(),
            network_template_config: config,
        }
    }
}

/// A network as the controller stores it, with the template config parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPayload {
    pub fabric: String,
    pub network_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<u32>,
    pub network_template: String,
    pub network_extension_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf: Option<String>,
    #[serde(default)]
    pub network_template_config: BTreeMap<String, String>,
}

impl Keyed for NetworkPayload {
    fn key(&self) -> String {
        object_key(&self.fabric, &self.network_name)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetwork {
    #[serde(default, deserialize_with = "string_or_default")]
    fabric: String,
    #[serde(default, deserialize_with = "string_or_default")]
    network_name: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    network_id: Option<u32>,
    #[serde(default, deserialize_with = "string_or_default")]
    network_template: String,
    #[serde(default, deserialize_with = "string_or_default")]
    network_extension_template: String,
    #[serde(default, deserialize_with = "string_or_default")]
    vrf: String,
    #[serde(default, deserialize_with = "string_or_default")]
    network_template_config: String,
}

impl TopDownObject for NetworkPayload {
    const KIND: &'static str = "network";
    const TEMPLATE_CONFIG_FIELD: &'static str = "networkTemplateConfig";

    fn fabric(&self) -> &str {
        &self.fabric
    }

    fn name(&self) -> &str {
        &self.network_name
    }

    fn list_endpoint(fabric: &str) -> Endpoint {
        networks::list(fabric)
    }

    fn create_endpoint(fabric: &str) -> Endpoint {
        networks::create(fabric)
    }

    fn update_endpoint(fabric: &str, name: &str) -> Endpoint {
        networks::update(fabric, name)
    }

    fn bulk_delete_endpoint(fabric: &str, names: &[String]) -> Endpoint {
        networks::bulk_delete(fabric, names)
    }

    fn with_defaults(mut self) -> Self {
        fill_defaults(&mut self.network_template_config, TEMPLATE_DEFAULTS);
        self
    }

    fn from_controller(value: Value) -> NdfcResult<Self> {
        let raw: RawNetwork = serde_json::from_value(value)?;
        let mut config =
            wire::parse_template_config("networkTemplateConfig", &raw.network_template_config)?;
        retain_keys(&mut config, TEMPLATE_KEYS);
        Ok(Self {
            fabric: raw.fabric,
            network_name: raw.network_name,
            network_id: raw.network_id,
            network_template: raw.network_template,
            network_extension_template: raw.network_extension_template,
            vrf: Some(raw.vrf).filter(|v| !v.is_empty()),
            network_template_config: config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> NetworkConfig {
        NetworkConfig {
            network_id: Some(30001),
            vlan_id: Some(3001),
            vrf_name: Some("vrf_1".to_string()),
            gateway_ip_address: Some("10.1.1.1/24".to_string()),
            ..NetworkConfig::new("f1", "net_1")
        }
    }

    #[test]
    fn test_validate() {
        assert!(config().validate(State::Merged).is_ok());

        let no_vrf = NetworkConfig {
            vrf_name: None,
            ..config()
        };
        assert!(no_vrf.validate(State::Merged).is_err());

        let bad_gw = NetworkConfig {
            gateway_ip_address: Some("10.1.1.0/24".to_string()),
            ..config()
        };
        assert!(bad_gw.validate(State::Merged).is_err());

        let l2 = NetworkConfig {
            is_layer2_only: Some(true),
            vrf_name: None,
            gateway_ip_address: None,
            ..config()
        };
        assert!(l2.validate(State::Merged).is_ok());
        assert!(NetworkConfig::new("f1", "net_1")
            .validate(State::Deleted)
            .is_ok());
    }

    #[test]
    fn test_layer2_only_uses_placeholder_vrf() {
        let l2 = NetworkConfig {
            is_layer2_only: Some(true),
            vrf_name: Some("ignored".to_string()),
            gateway_ip_address: None,
            ..config()
        };
        let object = l2.to_object();
        assert_eq!(object.vrf.as_deref(), Some(LAYER2_VRF));
        assert_eq!(object.network_template_config["vrfName"], LAYER2_VRF);
        assert_eq!(object.network_template_config["isLayer2Only"], "true");
    }

    #[test]
    fn test_to_object_and_defaults() {
        let object = config().to_object();
        assert_eq!(object.network_template_config["gatewayIpAddress"], "10.1.1.1/24");
        assert_eq!(object.network_template_config["segmentId"], "30001");
        assert!(!object.network_template_config.contains_key("suppressArp"));

        let body = object.with_defaults().to_body().unwrap();
        assert!(body["networkTemplateConfig"].is_string());
        assert_eq!(body["vrf"], "vrf_1");
    }
}
