//! Switch inventory of a fabric.
//!
//! Most resources accept a switch by management IP; the controller wants
//! serial numbers. [`Inventory`] resolves one to the other.

use ndfc_common::{endpoints, NdfcError, NdfcResult, RestSend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tracing::{debug, instrument};

use crate::wire::{self, string_or_default};

/// One switch as reported by the inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchInfo {
    #[serde(default, deserialize_with = "string_or_default")]
    pub ip_address: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub serial_number: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub logical_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub model: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub release: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub mode: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub system_mode: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub fabric_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub switch_role: String,
}

/// Switches in one fabric.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    fabric: String,
    switches: Vec<SwitchInfo>,
}

impl Inventory {
    /// Builds an inventory from known switches.
    pub fn new(fabric: impl Into<String>, switches: Vec<SwitchInfo>) -> Self {
        Self {
            fabric: fabric.into(),
            switches,
        }
    }

    /// Fetches the switches of `fabric`.
    #[instrument(skip(rest_send))]
    pub async fn fetch(rest_send: &RestSend, fabric: &str) -> NdfcResult<Self> {
        let endpoint = endpoints::fabrics::switches_by_fabric(fabric);
        let response = rest_send.get(&endpoint.path).await?;
        if response.is_not_found() {
            return Err(NdfcError::not_found("fabric", fabric));
        }

        let switches = wire::list_body(&response)?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<SwitchInfo>, _>>()?;
        debug!(fabric, count = switches.len(), "Fetched inventory");
        Ok(Self::new(fabric, switches))
    }

    /// Fabric name.
    pub fn fabric(&self) -> &str {
        &self.fabric
    }

    /// All switches.
    pub fn switches(&self) -> &[SwitchInfo] {
        &self.switches
    }

    /// Finds a switch by management IP.
    pub fn by_ip(&self, ip: &str) -> Option<&SwitchInfo> {
        self.switches.iter().find(|s| s.ip_address == ip)
    }

    /// Finds a switch by serial number.
    pub fn by_serial(&self, serial: &str) -> Option<&SwitchInfo> {
        self.switches.iter().find(|s| s.serial_number == serial)
    }

    /// Returns the serial number of the switch at `ip`.
    pub fn serial_for_ip(&self, ip: &str) -> NdfcResult<&str> {
        self.by_ip(ip)
            .map(|s| s.serial_number.as_str())
            .ok_or_else(|| NdfcError::not_found("switch", format!("{} in fabric {}", ip, self.fabric)))
    }

    /// Returns the management IP of the switch with `serial`.
    pub fn ip_for_serial(&self, serial: &str) -> NdfcResult<&str> {
        self.by_serial(serial)
            .map(|s| s.ip_address.as_str())
            .ok_or_else(|| {
                NdfcError::not_found("switch", format!("{} in fabric {}", serial, self.fabric))
            })
    }

    /// Resolves a switch given as IPv4 address or serial number to its
    /// serial number.
    pub fn resolve(&self, switch: &str) -> NdfcResult<String> {
        if is_ipv4(switch) {
            self.serial_for_ip(switch).map(String::from)
        } else {
            self.by_serial(switch)
                .map(|s| s.serial_number.clone())
                .ok_or_else(|| {
                    NdfcError::not_found("switch", format!("{} in fabric {}", switch, self.fabric))
                })
        }
    }
}

/// Inventories fetched on demand, one per fabric.
#[derive(Debug, Default)]
pub struct InventoryCache {
    inventories: BTreeMap<String, Inventory>,
}

impl InventoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the inventory of `fabric`, fetching it on first use.
    pub async fn get(&mut self, rest_send: &RestSend, fabric: &str) -> NdfcResult<&Inventory> {
        if !self.inventories.contains_key(fabric) {
            let inventory = Inventory::fetch(rest_send, fabric).await?;
            self.inventories.insert(fabric.to_string(), inventory);
        }
        self.inventories
            .get(fabric)
            .ok_or_else(|| NdfcError::internal(format!("inventory of {} missing from cache", fabric)))
    }

    /// Resolves a switch to its serial number. Serial numbers are returned
    /// as given; only IPv4 addresses need the inventory.
    pub async fn resolve(
        &mut self,
        rest_send: &RestSend,
        fabric: &str,
        switch: &str,
    ) -> NdfcResult<String> {
        if !is_ipv4(switch) {
            return Ok(switch.to_string());
        }
        self.get(rest_send, fabric)
            .await?
            .serial_for_ip(switch)
            .map(String::from)
    }
}

/// Returns true if `value` is a dotted-quad IPv4 address.
pub fn is_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}
