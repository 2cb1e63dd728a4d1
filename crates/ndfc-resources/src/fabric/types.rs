//! Fabric configuration and payload types.

use ndfc_common::validations::{validate_asn, validate_fabric_name, validate_mac};
use ndfc_common::{Keyed, NdfcError, NdfcResult, State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::wire::{string_map, string_or_default};

/// Default anycast gateway MAC.
pub const DEFAULT_ANYCAST_GW_MAC: &str = "2020.0000.00aa";

/// nvPair keys set from typed configuration fields.
pub mod nv {
    pub const FABRIC_NAME: &str = "FABRIC_NAME";
    pub const FABRIC_TYPE: &str = "FABRIC_TYPE";
    pub const BGP_AS: &str = "BGP_AS";
    pub const REPLICATION_MODE: &str = "REPLICATION_MODE";
    pub const ANYCAST_GW_MAC: &str = "ANYCAST_GW_MAC";
    pub const UNDERLAY_IS_V6: &str = "UNDERLAY_IS_V6";
}

/// Fabric template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FabricTemplate {
    /// VXLAN EVPN fabric
    #[default]
    #[serde(rename = "Easy_Fabric", alias = "VXLAN_EVPN")]
    EasyFabric,
    /// External connectivity network
    #[serde(rename = "External_Fabric", alias = "External")]
    External,
    /// Classic LAN
    #[serde(rename = "LAN_Classic")]
    LanClassic,
    /// Multi-site domain
    #[serde(rename = "MSD_Fabric", alias = "MSD")]
    Msd,
}

impl FabricTemplate {
    /// Template name as the controller knows it.
    pub fn template_name(&self) -> &'static str {
        match self {
            FabricTemplate::EasyFabric => "Easy_Fabric",
            FabricTemplate::External => "External_Fabric",
            FabricTemplate::LanClassic => "LAN_Classic",
            FabricTemplate::Msd => "MSD_Fabric",
        }
    }

    /// Value of the FABRIC_TYPE nvPair.
    pub fn fabric_type(&self) -> &'static str {
        match self {
            FabricTemplate::EasyFabric => "Switch_Fabric",
            FabricTemplate::External => "External",
            FabricTemplate::LanClassic => "LAN_CLASSIC",
            FabricTemplate::Msd => "MFD",
        }
    }

    /// Returns true if fabrics of this template need a BGP AS.
    pub fn requires_bgp_as(&self) -> bool {
        matches!(self, FabricTemplate::EasyFabric | FabricTemplate::External)
    }

    /// nvPairs the controller expects on create when the user leaves them unset.
    fn create_defaults(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            FabricTemplate::EasyFabric => &[
                (nv::REPLICATION_MODE, "Multicast"),
                (nv::ANYCAST_GW_MAC, DEFAULT_ANYCAST_GW_MAC),
                (nv::UNDERLAY_IS_V6, "false"),
            ],
            FabricTemplate::Msd => &[(nv::ANYCAST_GW_MAC, DEFAULT_ANYCAST_GW_MAC)],
            FabricTemplate::External => &[("IS_READ_ONLY", "true")],
            FabricTemplate::LanClassic => &[],
        }
    }
}

impl fmt::Display for FabricTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_name())
    }
}

/// BUM traffic replication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationMode {
    /// Replication through the underlay multicast groups
    Multicast,
    /// Head-end replication to each VTEP
    Ingress,
}

impl ReplicationMode {
    /// Value of the REPLICATION_MODE nvPair.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationMode::Multicast => "Multicast",
            ReplicationMode::Ingress => "Ingress",
        }
    }
}

/// User configuration for one fabric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Fabric name, the reconcile key
    pub fabric_name: String,
    /// Template the fabric is built from
    #[serde(default)]
    pub template: FabricTemplate,
    /// BGP AS, plain or dotted notation
    #[serde(default)]
    pub bgp_as: Option<String>,
    /// BUM replication mode
    #[serde(default)]
    pub replication_mode: Option<ReplicationMode>,
    /// Anycast gateway MAC, `xxxx.xxxx.xxxx`
    #[serde(default)]
    pub anycast_gw_mac: Option<String>,
    /// IPv6 underlay
    #[serde(default)]
    pub underlay_is_v6: Option<bool>,
    /// Any other template parameter, by nvPair name
    #[serde(default)]
    pub nv_pairs: BTreeMap<String, String>,
}

impl FabricConfig {
    /// Creates a config for `fabric_name` with every optional field unset.
    pub fn new(fabric_name: impl Into<String>) -> Self {
        Self {
            fabric_name: fabric_name.into(),
            ..Default::default()
        }
    }

    /// Validates the fields `state` needs.
    pub fn validate(&self, state: State) -> NdfcResult<()> {
        validate_fabric_name("fabric_name", &self.fabric_name)?;
        if matches!(state, State::Deleted | State::Query) {
            return Ok(());
        }

        match &self.bgp_as {
            Some(asn) => validate_asn("bgp_as", asn)?,
            None if self.template.requires_bgp_as() && state != State::Merged => {
                return Err(NdfcError::invalid_config(
                    "bgp_as",
                    format!("{} fabrics require bgp_as", self.template),
                ));
            }
            None => {}
        }
        if let Some(mac) = &self.anycast_gw_mac {
            validate_mac("anycast_gw_mac", mac)?;
        }
        Ok(())
    }

    /// Builds the payload from the fields the user set.
    pub fn to_payload(&self) -> FabricPayload {
        let mut nv_pairs = self.nv_pairs.clone();
        nv_pairs.insert(nv::FABRIC_NAME.to_string(), self.fabric_name.clone());
        nv_pairs.insert(
            nv::FABRIC_TYPE.to_string(),
            self.template.fabric_type().to_string(),
        );
        if let Some(asn) = &self.bgp_as {
            nv_pairs.insert(nv::BGP_AS.to_string(), asn.clone());
        }
        if let Some(mode) = self.replication_mode {
            nv_pairs.insert(nv::REPLICATION_MODE.to_string(), mode.as_str().to_string());
        }
        if let Some(mac) = &self.anycast_gw_mac {
            nv_pairs.insert(nv::ANYCAST_GW_MAC.to_string(), mac.clone());
        }
        if let Some(v6) = self.underlay_is_v6 {
            nv_pairs.insert(nv::UNDERLAY_IS_V6.to_string(), v6.to_string());
        }

        FabricPayload {
            fabric_name: self.fabric_name.clone(),
            template_name: self.template.template_name().to_string(),
            nv_pairs,
        }
    }
}

/// A fabric as the controller stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricPayload {
    #[serde(default, deserialize_with = "string_or_default")]
    pub fabric_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub template_name: String,
    #[serde(default, deserialize_with = "string_map")]
    pub nv_pairs: BTreeMap<String, String>,
}

impl Keyed for FabricPayload {
    fn key(&self) -> String {
        self.fabric_name.clone()
    }
}

impl FabricPayload {
    /// Fills template defaults for nvPairs the user left unset.
    pub fn with_create_defaults(mut self, template: FabricTemplate) -> Self {
        for (key, value) in template.create_defaults() {
            self.nv_pairs
                .entry((*key).to_string())
                .or_insert_with(|| (*value).to_string());
        }
        self
    }

    /// Keeps only the nvPairs named in `keys`.
    pub fn project(&self, keys: &BTreeMap<String, String>) -> Self {
        Self {
            fabric_name: self.fabric_name.clone(),
            template_name: self.template_name.clone(),
            nv_pairs: self
                .nv_pairs
                .iter()
                .filter(|(k, _)| keys.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}
