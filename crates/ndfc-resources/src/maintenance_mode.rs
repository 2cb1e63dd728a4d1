//! Switch maintenance mode.
//!
//! A switch in maintenance mode is isolated from the data plane (BGP
//! graceful shutdown, shut uplinks) so it can be upgraded or replaced.
//! The controller records both the configured `mode` and the `systemMode`
//! the switch reports; the two differ until the change is deployed.

use async_trait::async_trait;
use ndfc_common::endpoints::fabrics;
use ndfc_common::validations::{validate_fabric_name, validate_ipv4_address};
use ndfc_common::{NdfcError, NdfcResult, Reconciler, RestSend, Results, State};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info, instrument};

use crate::inventory::InventoryCache;

/// Operating mode of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Maintenance,
    Normal,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Maintenance => "maintenance",
            Mode::Normal => "normal",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User configuration for one switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceModeConfig {
    pub fabric: String,
    pub ip: String,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    /// Deploy the fabric configuration to the switch after a change
    #[serde(default)]
    pub deploy: bool,
}

fn default_mode() -> Mode {
    Mode::Normal
}

impl MaintenanceModeConfig {
    pub fn new(fabric: impl Into<String>, ip: impl Into<String>, mode: Mode) -> Self {
        Self {
            fabric: fabric.into(),
            ip: ip.into(),
            mode,
            deploy: false,
        }
    }

    pub fn validate(&self) -> NdfcResult<()> {
        validate_fabric_name("fabric", &self.fabric)?;
        validate_ipv4_address("ip", &self.ip)
    }
}

/// Mode of one switch as the controller reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchMode {
    pub ip: String,
    #[serde(rename = "serial")]
    pub serial_number: String,
    pub fabric: String,
    /// Configured mode, lowercased
    pub mode: String,
    /// Mode the switch runs in, lowercased
    pub system_mode: String,
}

impl SwitchMode {
    /// Whether the switch is configured for `mode`.
    pub fn is(&self, mode: Mode) -> bool {
        self.mode == mode.as_str()
    }
}

/// A mode change for one switch.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    pub fabric: String,
    pub ip: String,
    pub serial_number: String,
    pub mode: Mode,
    pub deploy: bool,
}

/// Puts switches into maintenance mode or back to normal mode.
///
/// - merged: change the mode of switches whose mode differs, then deploy
///   when asked
/// - query: report the mode of each listed switch
pub struct MaintenanceModeMgr {
    rest_send: RestSend,
    state: State,
    config: Vec<MaintenanceModeConfig>,
    inventories: InventoryCache,
    /// Keyed by `fabric/ip`
    have: BTreeMap<String, SwitchMode>,
    need: Vec<ModeChange>,
    results: Results,
}

impl MaintenanceModeMgr {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: Vec<MaintenanceModeConfig>) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            rest_send,
            state,
            config,
            inventories: InventoryCache::new(),
            have: BTreeMap::new(),
            need: Vec::new(),
            results,
        }
    }

    /// Current modes, keyed by `fabric/ip`.
    pub fn have(&self) -> &BTreeMap<String, SwitchMode> {
        &self.have
    }

    /// Changes computed by the last run.
    pub fn need(&self) -> &[ModeChange] {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }
}

fn switch_key(fabric: &str, ip: &str) -> String {
    format!("{}/{}", fabric, ip)
}

#[async_trait]
impl Reconciler for MaintenanceModeMgr {
    fn name(&self) -> &str {
        "maintenance-mode"
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if !matches!(self.state, State::Merged | State::Query) {
            return Err(NdfcError::invalid_config(
                "state",
                "maintenance mode supports merged and query",
            ));
        }
        if self.config.is_empty() {
            return Err(NdfcError::invalid_config(
                "config",
                format!("state {} needs at least one switch", self.state),
            ));
        }
        let mut seen = BTreeSet::new();
        for config in &self.config {
            config.validate()?;
            if !seen.insert(switch_key(&config.fabric, &config.ip)) {
                return Err(NdfcError::invalid_config(
                    "ip",
                    format!("switch {} is listed more than once", config.ip),
                ));
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        self.have.clear();
        for config in &self.config {
            let inventory = self.inventories.get(&self.rest_send, &config.fabric).await?;
            let switch = inventory.by_ip(&config.ip).ok_or_else(|| {
                NdfcError::not_found("switch", format!("{} in fabric {}", config.ip, config.fabric))
            })?;
            let mode = if switch.mode.is_empty() {
                &switch.system_mode
            } else {
                &switch.mode
            };
            let state = SwitchMode {
                ip: switch.ip_address.clone(),
                serial_number: switch.serial_number.clone(),
                fabric: config.fabric.clone(),
                mode: mode.to_lowercase(),
                system_mode: switch.system_mode.to_lowercase(),
            };
            self.have.insert(switch_key(&config.fabric, &config.ip), state);
        }
        debug!(count = self.have.len(), "Fetched have");
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        self.need.clear();
        if self.state == State::Query {
            return Ok(());
        }
        for config in &self.config {
            let key = switch_key(&config.fabric, &config.ip);
            let have = self
                .have
                .get(&key)
                .ok_or_else(|| NdfcError::not_found("switch", key.clone()))?;
            if have.is(config.mode) {
                debug!(ip = %config.ip, mode = %config.mode, "Already in desired mode");
                continue;
            }
            self.need.push(ModeChange {
                fabric: config.fabric.clone(),
                ip: config.ip.clone(),
                serial_number: have.serial_number.clone(),
                mode: config.mode,
                deploy: config.deploy,
            });
        }
        debug!(count = self.need.len(), "Computed need");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply(&mut self) -> NdfcResult<()> {
        if self.state == State::Query {
            let found = self
                .have
                .values()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            for value in found {
                self.results.register_unchanged("query", value);
            }
            return Ok(());
        }

        let changes = std::mem::take(&mut self.need);
        let mut deploy: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for change in &changes {
            let endpoint = fabrics::maintenance_mode(
                &change.fabric,
                &change.serial_number,
                change.mode == Mode::Maintenance,
            );
            let diff = serde_json::json!({
                "fabric": change.fabric,
                "ip": change.ip,
                "serial": change.serial_number,
                "mode": change.mode,
            });
            self.rest_send
                .commit_with_diff(
                    &mut self.results,
                    change.mode.as_str(),
                    Some(diff),
                    endpoint.verb,
                    &endpoint.path,
                    None,
                )
                .await?;
            info!(ip = %change.ip, mode = %change.mode, "Changed switch mode");
            if change.deploy {
                deploy
                    .entry(change.fabric.clone())
                    .or_default()
                    .push(change.serial_number.clone());
            }
        }

        for (fabric, serials) in deploy {
            let endpoint = fabrics::config_deploy_switches(&fabric, &serials);
            let diff = serde_json::json!({"fabric": fabric, "serials": serials});
            self.rest_send
                .commit_with_diff(
                    &mut self.results,
                    "deploy",
                    Some(diff),
                    endpoint.verb,
                    &endpoint.path,
                    None,
                )
                .await?;
            info!(fabric = %fabric, ?serials, "Deployed switches");
        }
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}
