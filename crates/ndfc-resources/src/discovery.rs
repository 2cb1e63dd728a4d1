//! Switch discovery.
//!
//! Discovery is two calls: test-reachability checks a seed switch (and
//! its neighbors, up to `max_hops`) with the given credentials, then
//! discover adds the reachable switches to the fabric.

use async_trait::async_trait;
use ndfc_common::endpoints::fabrics;
use ndfc_common::validations::{validate_fabric_name, validate_ipv4_address, validate_not_empty};
use ndfc_common::{NdfcError, NdfcResult, Reconciler, RestSend, Results, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use crate::inventory::Inventory;
use crate::wire::{self, lenient_bool, string_or_default};

/// SNMPv3 authentication with MD5.
pub const AUTH_MD5: u8 = 0;
/// SNMPv3 authentication with SHA.
pub const AUTH_SHA: u8 = 1;

fn default_true() -> bool {
    true
}

fn default_cdp_timeout() -> u32 {
    5
}

/// User configuration for one discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverConfig {
    pub fabric: String,
    pub seed_ip: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub max_hops: u8,
    /// Keep the switch's running configuration
    #[serde(default = "default_true")]
    pub preserve_config: bool,
    #[serde(default)]
    pub auth_protocol: u8,
    #[serde(default = "default_cdp_timeout")]
    pub cdp_second_timeout: u32,
}

impl DiscoverConfig {
    pub fn new(
        fabric: impl Into<String>,
        seed_ip: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            fabric: fabric.into(),
            seed_ip: seed_ip.into(),
            username: username.into(),
            password: password.into(),
            max_hops: 0,
            preserve_config: true,
            auth_protocol: AUTH_MD5,
            cdp_second_timeout: default_cdp_timeout(),
        }
    }

    pub fn validate(&self) -> NdfcResult<()> {
        validate_fabric_name("fabric", &self.fabric)?;
        validate_ipv4_address("seed_ip", &self.seed_ip)?;
        validate_not_empty("username", &self.username)?;
        validate_not_empty("password", &self.password)?;
        if self.auth_protocol > AUTH_SHA {
            return Err(NdfcError::invalid_config(
                "auth_protocol",
                format!("{} is not 0 (MD5) or 1 (SHA)", self.auth_protocol),
            ));
        }
        Ok(())
    }

    /// Body shared by test-reachability and discover.
    fn body(&self) -> Value {
        json!({
            "seedIP": self.seed_ip,
            "username": self.username,
            "password": self.password,
            "maxHops": self.max_hops,
            "preserveConfig": self.preserve_config,
            "snmpV3AuthProtocol": self.auth_protocol,
            "cdpSecondTimeout": self.cdp_second_timeout,
            "discoveryCredForLan": false,
        })
    }

    /// Request diff without the password.
    fn redacted(&self, switches: &[String]) -> Value {
        json!({
            "fabric": self.fabric,
            "seedIP": self.seed_ip,
            "username": self.username,
            "maxHops": self.max_hops,
            "preserveConfig": self.preserve_config,
            "switches": switches,
        })
    }
}

/// One switch from a test-reachability reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachableSwitch {
    #[serde(default, deserialize_with = "string_or_default")]
    pub ipaddr: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub sys_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub serial_number: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub platform: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub version: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub device_index: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub reachable: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub auth: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub selectable: bool,
    #[serde(default, deserialize_with = "string_or_default")]
    pub status_reason: String,
}

impl ReachableSwitch {
    /// Whether the controller can add this switch.
    pub fn discoverable(&self) -> bool {
        self.reachable && self.auth && self.selectable
    }

    /// Entry of the discover request's switch list. The controller wants
    /// the fields back exactly as test-reachability reported them.
    fn to_discover(&self) -> Value {
        json!({
            "ipaddr": self.ipaddr,
            "sysName": self.sys_name,
            "serialNumber": self.serial_number,
            "platform": self.platform,
            "version": self.version,
            "deviceIndex": self.device_index,
            "reachable": self.reachable,
            "auth": self.auth,
            "selectable": self.selectable,
        })
    }
}

/// Discovers switches and adds them to a fabric.
///
/// Only merged is supported. Switches already in the fabric inventory are
/// skipped; if none are left, nothing is sent.
pub struct DiscoveryMgr {
    rest_send: RestSend,
    state: State,
    config: Vec<DiscoverConfig>,
    /// Serial numbers and IPs already in each configured fabric, per config entry
    known: Vec<BTreeSet<String>>,
    need: Vec<(usize, Vec<ReachableSwitch>)>,
    results: Results,
}

impl DiscoveryMgr {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: Vec<DiscoverConfig>) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            rest_send,
            state,
            config,
            known: Vec::new(),
            need: Vec::new(),
            results,
        }
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    /// Probes the seed switch of `config` and returns every switch found.
    #[instrument(skip(self, config), fields(fabric = %config.fabric, seed = %config.seed_ip))]
    pub async fn test_reachability(&self, config: &DiscoverConfig) -> NdfcResult<Vec<ReachableSwitch>> {
        let endpoint = fabrics::test_reachability(&config.fabric);
        let response = self
            .rest_send
            .commit(endpoint.verb, &endpoint.path, Some(config.body()))
            .await?;

        if self.rest_send.check_mode() {
            debug!("Check mode, treating the seed switch as the only reachable switch");
            return Ok(vec![ReachableSwitch {
                ipaddr: config.seed_ip.clone(),
                sys_name: String::new(),
                serial_number: String::new(),
                platform: String::new(),
                version: String::new(),
                device_index: String::new(),
                reachable: true,
                auth: true,
                selectable: true,
                status_reason: "check mode".to_string(),
            }]);
        }

        let switches = wire::list_body(&response)?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<ReachableSwitch>, _>>()?;
        for switch in switches.iter().filter(|s| !s.discoverable()) {
            warn!(ip = %switch.ipaddr, reason = %switch.status_reason, "Switch not discoverable");
        }
        Ok(switches)
    }
}

#[async_trait]
impl Reconciler for DiscoveryMgr {
    fn name(&self) -> &str {
        "discover"
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if self.state != State::Merged {
            return Err(NdfcError::invalid_config("state", "discovery supports merged"));
        }
        if self.config.is_empty() {
            return Err(NdfcError::invalid_config(
                "config",
                "discovery needs at least one seed switch",
            ));
        }
        for config in &self.config {
            config.validate()?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        let mut known = Vec::with_capacity(self.config.len());
        for config in &self.config {
            let inventory = Inventory::fetch(&self.rest_send, &config.fabric).await?;
            known.push(
                inventory
                    .switches()
                    .iter()
                    .flat_map(|s| [s.serial_number.clone(), s.ip_address.clone()])
                    .filter(|id| !id.is_empty())
                    .collect(),
            );
        }
        self.known = known;

        // Reachability is part of have: it reports what the controller can see.
        let mut need = Vec::new();
        for (index, config) in self.config.iter().enumerate() {
            let found = self.test_reachability(config).await?;
            let known = &self.known[index];
            let new: Vec<ReachableSwitch> = found
                .into_iter()
                .filter(|s| s.discoverable())
                .filter(|s| !known.contains(&s.serial_number) && !known.contains(&s.ipaddr))
                .collect();
            need.push((index, new));
        }
        self.need = need;
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        self.need.retain(|(_, switches)| !switches.is_empty());
        debug!(seeds = self.need.len(), "Computed need");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply(&mut self) -> NdfcResult<()> {
        if self.need.is_empty() {
            for config in &self.config {
                self.results.register_unchanged(
                    "discover",
                    json!({"fabric": config.fabric, "seedIP": config.seed_ip, "switches": []}),
                );
            }
            info!("Every reachable switch is already in its fabric");
            return Ok(());
        }

        for (index, switches) in std::mem::take(&mut self.need) {
            let config = self.config[index].clone();
            let mut body = config.body();
            body["switches"] =
                Value::Array(switches.iter().map(ReachableSwitch::to_discover).collect());
            let ips: Vec<String> = switches.iter().map(|s| s.ipaddr.clone()).collect();

            let endpoint = fabrics::discover(&config.fabric);
            self.rest_send
                .commit_with_diff(
                    &mut self.results,
                    "discover",
                    Some(config.redacted(&ips)),
                    endpoint.verb,
                    &endpoint.path,
                    Some(body),
                )
                .await?;
            info!(fabric = %config.fabric, switches = ?ips, "Discovered switches");
        }
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validate() {
        let config = DiscoverConfig::new("f1", "10.1.1.1", "admin", "secret");
        assert!(config.validate().is_ok());
        assert!(DiscoverConfig::new("f1", "10.1.1", "admin", "secret")
            .validate()
            .is_err());
        let bad_auth = DiscoverConfig {
            auth_protocol: 3,
            ..config.clone()
        };
        assert!(bad_auth.validate().is_err());
    }

    #[test]
    fn test_body_and_redacted_diff() {
        let config = DiscoverConfig::new("f1", "10.1.1.1", "admin", "secret");
        let body = config.body();
        assert_eq!(body["seedIP"], "10.1.1.1");
        assert_eq!(body["preserveConfig"], true);
        assert_eq!(body["maxHops"], 0);
        assert_eq!(body["cdpSecondTimeout"], 5);

        let diff = config.redacted(&["10.1.1.1".to_string()]);
        assert!(diff.get("password").is_none());
    }

    #[test]
    fn test_reachable_switch_from_reply() {
        let switch: ReachableSwitch = serde_json::from_value(json!({
            "ipaddr": "10.1.1.2",
            "sysName": "leaf-2",
            "serialNumber": "FDO2",
            "reachable": true,
            "auth": "true",
            "selectable": true,
            "vdcMac": null,
        }))
        .unwrap();
        assert!(switch.discoverable());
        assert_eq!(switch.to_discover()["serialNumber"], "FDO2");
    }
}
