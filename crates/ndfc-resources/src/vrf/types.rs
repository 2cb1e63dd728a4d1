//! VRF configuration and payload types.

use ndfc_common::endpoints::vrfs;
use ndfc_common::validations::{
    validate_fabric_name, validate_mtu, validate_object_name, validate_vlan_id, validate_vni,
};
use ndfc_common::{Endpoint, Keyed, NdfcError, NdfcResult, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::top_down::{fill_defaults, object_key, retain_keys, TopDownConfig, TopDownObject};
use crate::wire::{self, lenient_u32, string_or_default};

/// Default VRF template.
pub const DEFAULT_VRF_TEMPLATE: &str = "Default_VRF_Universal";
/// Default VRF extension template.
pub const DEFAULT_VRF_EXTENSION_TEMPLATE: &str = "Default_VRF_Extension_Universal";

/// Template parameters this client manages.
pub const TEMPLATE_KEYS: &[&str] = &[
    "vrfName",
    "vrfSegmentId",
    "vrfVlanId",
    "vrfVlanName",
    "vrfDescription",
    "vrfIntfDescription",
    "mtu",
    "tag",
    "vrfRouteMap",
    "maxBgpPaths",
    "maxIbgpPaths",
    "ipv6LinkLocalFlag",
    "advertiseHostRouteFlag",
    "advertiseDefaultRouteFlag",
    "configureStaticDefaultRouteFlag",
    "routeTargetBoth",
];

const TEMPLATE_DEFAULTS: &[(&str, &str)] = &[
    ("vrfVlanName", ""),
    ("vrfDescription", ""),
    ("vrfIntfDescription", ""),
    ("mtu", "9216"),
    ("tag", "12345"),
    ("vrfRouteMap", "FABRIC-RMAP-REDIST-SUBNET"),
    ("maxBgpPaths", "1"),
    ("maxIbgpPaths", "2"),
    ("ipv6LinkLocalFlag", "true"),
    ("advertiseHostRouteFlag", "false"),
    ("advertiseDefaultRouteFlag", "true"),
    ("configureStaticDefaultRouteFlag", "true"),
    ("routeTargetBoth", "false"),
];

fn default_vrf_template() -> String {
    DEFAULT_VRF_TEMPLATE.to_string()
}

fn default_vrf_extension_template() -> String {
    DEFAULT_VRF_EXTENSION_TEMPLATE.to_string()
}

/// User configuration for one VRF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VrfConfig {
    pub fabric: String,
    #[serde(default)]
    pub vrf_name: String,
    /// VRF VNI
    #[serde(default)]
    pub vrf_id: Option<u32>,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default = "default_vrf_template")]
    pub vrf_template: String,
    #[serde(default = "default_vrf_extension_template")]
    pub vrf_extension_template: String,
    #[serde(default)]
    pub vrf_description: Option<String>,
    #[serde(default)]
    pub vrf_vlan_name: Option<String>,
    #[serde(default)]
    pub vrf_intf_description: Option<String>,
    #[serde(default)]
    pub mtu: Option<u16>,
    #[serde(default)]
    pub tag: Option<u32>,
    #[serde(default)]
    pub route_target_both: Option<bool>,
    #[serde(default)]
    pub advertise_host_route: Option<bool>,
    #[serde(default)]
    pub advertise_default_route: Option<bool>,
}

impl VrfConfig {
    /// Creates a config for `fabric`/`vrf_name` with every optional field unset.
    pub fn new(fabric: impl Into<String>, vrf_name: impl Into<String>) -> Self {
        Self {
            fabric: fabric.into(),
            vrf_name: vrf_name.into(),
            vrf_id: None,
            vlan_id: None,
            vrf_template: default_vrf_template(),
            vrf_extension_template: default_vrf_extension_template(),
            vrf_description: None,
            vrf_vlan_name: None,
            vrf_intf_description: None,
            mtu: None,
            tag: None,
            route_target_both: None,
            advertise_host_route: None,
            advertise_default_route: None,
        }
    }
}

impl TopDownConfig for VrfConfig {
    type Object = VrfPayload;

    fn fabric(&self) -> &str {
        &self.fabric
    }

    fn name(&self) -> &str {
        &self.vrf_name
    }

    fn validate(&self, state: State) -> NdfcResult<()> {
        validate_fabric_name("fabric", &self.fabric)?;
        if self.vrf_name.is_empty() {
            return match state {
                State::Query | State::Deleted => Ok(()),
                _ => Err(NdfcError::invalid_config(
                    "vrf_name",
                    format!("required for state {}", state),
                )),
            };
        }
        validate_object_name("vrf_name", &self.vrf_name)?;
        if matches!(state, State::Query | State::Deleted) {
            return Ok(());
        }

        match self.vrf_id {
            Some(vni) => validate_vni("vrf_id", vni)?,
            None => {
                return Err(NdfcError::invalid_config(
                    "vrf_id",
                    format!("required for state {}", state),
                ))
            }
        }
        if let Some(vlan) = self.vlan_id {
            validate_vlan_id("vlan_id", vlan)?;
        }
        if let Some(mtu) = self.mtu {
            validate_mtu("mtu", mtu)?;
        }
        Ok(())
    }

    fn to_object(&self) -> VrfPayload {
        let mut config = BTreeMap::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                config.insert(key.to_string(), value);
            }
        };
        set("vrfName", Some(self.vrf_name.clone()));
        set("vrfSegmentId", self.vrf_id.map(|v| v.to_string()));
        set("vrfVlanId", self.vlan_id.map(|v| v.to_string()));
        set("vrfVlanName", self.vrf_vlan_name.clone());
        set("vrfDescription", self.vrf_description.clone());
        set("vrfIntfDescription", self.vrf_intf_description.clone());
        set("mtu", self.mtu.map(|v| v.to_string()));
        set("tag", self.tag.map(|v| v.to_string()));
        set("routeTargetBoth", self.route_target_both.map(|v| v.to_string()));
        set(
            "advertiseHostRouteFlag",
            self.advertise_host_route.map(|v| v.to_string()),
        );
        set(
            "advertiseDefaultRouteFlag",
            self.advertise_default_route.map(|v| v.to_string()),
        );

        VrfPayload {
            fabric: self.fabric.clone(),
            vrf_name: self.vrf_name.clone(),
            vrf_id: self.vrf_id,
            vrf_template: self.vrf_template.clone(),
            vrf_extension_template: self.vrf_extension_template.clone(),
            vrf_template_config: config,
        }
    }
}

/// A VRF as the controller stores it, with the template config parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VrfPayload {
    pub fabric: String,
    pub vrf_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vrf_id: Option<u32>,
    pub vrf_template: String,
    pub vrf_extension_template: String,
    #[serde(default)]
    pub vrf_template_config: BTreeMap<String, String>,
}

impl Keyed for VrfPayload {
    fn key(&self) -> String {
        object_key(&self.fabric, &self.vrf_name)
    }
}

/// List entry as sent by the controller.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVrf {
    #[serde(default, deserialize_with = "string_or_default")]
    fabric: String,
    #[serde(default, deserialize_with = "string_or_default")]
    vrf_name: String,
    #[serde(default, deserialize_with = "lenient_u32")]
    vrf_id: Option<u32>,
    #[serde(default, deserialize_with = "string_or_default")]
    vrf_template: String,
    #[serde(default, deserialize_with = "string_or_default")]
    vrf_extension_template: String,
    #[serde(default, deserialize_with = "string_or_default")]
    vrf_template_config: String,
}

impl TopDownObject for VrfPayload {
    const KIND: &'static str = "vrf";
    const TEMPLATE_CONFIG_FIELD: &'static str = "vrfTemplateConfig";

    fn fabric(&self) -> &str {
        &self.fabric
    }

    fn name(&self) -> &str {
        &self.vrf_name
    }

    fn list_endpoint(fabric: &str) -> Endpoint {
        vrfs::list(fabric)
    }

    fn create_endpoint(fabric: &str) -> Endpoint {
        vrfs::create(fabric)
    }

    fn update_endpoint(fabric: &str, name: &str) -> Endpoint {
        vrfs::update(fabric, name)
    }

    fn bulk_delete_endpoint(fabric: &str, names: &[String]) -> Endpoint {
        vrfs::bulk_delete(fabric, names)
    }

    fn with_defaults(mut self) -> Self {
        fill_defaults(&mut self.vrf_template_config, TEMPLATE_DEFAULTS);
        self
    }

    fn from_controller(value: Value) -> NdfcResult<Self> {
        let raw: RawVrf = serde_json::from_value(value)?;
        let mut config = wire::parse_template_config("vrfTemplateConfig", &raw.vrf_template_config)?;
        retain_keys(&mut config, TEMPLATE_KEYS);
        Ok(Self {
            fabric: raw.fabric,
            vrf_name: raw.vrf_name,
            vrf_id: raw.vrf_id,
            vrf_template: raw.vrf_template,
            vrf_extension_template: raw.vrf_extension_template,
            vrf_template_config: config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> VrfConfig {
        VrfConfig {
            vrf_id: Some(50001),
            vlan_id: Some(2001),
            ..VrfConfig::new("f1", "vrf_1")
        }
    }

    #[test]
    fn test_validate() {
        assert!(config().validate(State::Merged).is_ok());
        assert!(VrfConfig::new("f1", "vrf_1").validate(State::Merged).is_err());
        assert!(VrfConfig::new("f1", "").validate(State::Deleted).is_ok());
        assert!(VrfConfig::new("f1", "").validate(State::Merged).is_err());

        let bad_vlan = VrfConfig {
            vlan_id: Some(4095),
            ..config()
        };
        assert!(bad_vlan.validate(State::Replaced).is_err());
    }

    #[test]
    fn test_to_object_sets_only_user_fields() {
        let object = config().to_object();
        assert_eq!(object.vrf_template_config["vrfSegmentId"], "50001");
        assert_eq!(object.vrf_template_config["vrfVlanId"], "2001");
        assert!(!object.vrf_template_config.contains_key("mtu"));

        let object = object.with_defaults();
        assert_eq!(object.vrf_template_config["mtu"], "9216");
        assert_eq!(object.vrf_template_config["tag"], "12345");
    }

    #[test]
    fn test_body_renders_template_config_as_string() {
        let body = config().to_object().to_body().unwrap();
        let rendered = body["vrfTemplateConfig"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(rendered).unwrap();
        assert_eq!(parsed["vrfName"], "vrf_1");
        assert_eq!(body["vrfId"], 50001);
    }

    #[test]
    fn test_from_controller() {
        let entry = json!({
            "fabric": "f1",
            "vrfName": "vrf_1",
            "vrfId": 50001,
            "vrfTemplate": "Default_VRF_Universal",
            "vrfExtensionTemplate": "Default_VRF_Extension_Universal",
            "vrfTemplateConfig": "{\"vrfName\":\"vrf_1\",\"vrfVlanId\":2001,\"nveId\":\"1\"}",
            "vrfStatus": "DEPLOYED",
        });
        let object = VrfPayload::from_controller(entry).unwrap();
        assert_eq!(object.key(), "f1/vrf_1");
        assert_eq!(object.vrf_template_config["vrfVlanId"], "2001");
        assert!(!object.vrf_template_config.contains_key("nveId"));
    }
}
