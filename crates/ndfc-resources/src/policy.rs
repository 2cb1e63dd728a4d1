//! Switch policies.
//!
//! A policy instantiates a template on one switch. The controller assigns
//! each policy an ID (`POLICY-12345`); users name policies by description,
//! so a policy is keyed by switch, template and description.

use async_trait::async_trait;
use ndfc_common::endpoints::policies;
use ndfc_common::validations::{validate_fabric_name, validate_not_empty, validate_range};
use ndfc_common::{
    compute_need, Endpoint, Keyed, NdfcError, NdfcResult, Need, Reconciler, RestSend, Results,
    State,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use crate::inventory::InventoryCache;
use crate::wire::{self, lenient_bool, lenient_u16, string_map, string_or_default};

/// Priority given to policies that do not set one.
pub const DEFAULT_PRIORITY: u16 = 500;

fn default_entity() -> String {
    "SWITCH".to_string()
}

/// User configuration for one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub fabric: String,
    /// Management IP or serial number
    pub switch: String,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Option<u16>,
    #[serde(default = "default_entity")]
    pub entity_type: String,
    #[serde(default = "default_entity")]
    pub entity_name: String,
    #[serde(default)]
    pub nv_pairs: BTreeMap<String, String>,
    /// Selects one policy for deleted and query
    #[serde(default)]
    pub policy_id: Option<String>,
}

impl PolicyConfig {
    pub fn new(fabric: impl Into<String>, switch: impl Into<String>) -> Self {
        Self {
            fabric: fabric.into(),
            switch: switch.into(),
            template_name: None,
            description: String::new(),
            priority: None,
            entity_type: default_entity(),
            entity_name: default_entity(),
            nv_pairs: BTreeMap::new(),
            policy_id: None,
        }
    }

    pub fn validate(&self, state: State) -> NdfcResult<()> {
        validate_fabric_name("fabric", &self.fabric)?;
        validate_not_empty("switch", &self.switch)?;
        if let Some(priority) = self.priority {
            validate_range("priority", priority, 1, 1000)?;
        }
        match state {
            State::Merged => {
                match &self.template_name {
                    Some(template) => validate_not_empty("template_name", template)?,
                    None => {
                        return Err(NdfcError::invalid_config(
                            "template_name",
                            "required for state merged",
                        ))
                    }
                }
                validate_not_empty("description", &self.description)?;
            }
            State::Deleted => {
                if self.policy_id.is_none() && self.description.is_empty() {
                    return Err(NdfcError::invalid_config(
                        "description",
                        "deleted needs a policy_id or a description",
                    ));
                }
            }
            State::Query => {}
            State::Replaced | State::Overridden => {
                return Err(NdfcError::invalid_config(
                    "state",
                    "policies support merged, deleted and query",
                ))
            }
        }
        Ok(())
    }

    /// Whether `policy` is the one this config selects, on its switch.
    fn selects(&self, policy: &Policy) -> bool {
        if let Some(id) = &self.policy_id {
            return policy.policy_id.as_deref() == Some(id.as_str());
        }
        if let Some(template) = &self.template_name {
            if &policy.template_name != template {
                return false;
            }
        }
        self.description.is_empty() || policy.description == self.description
    }
}

/// A policy on one switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    pub serial_number: String,
    pub template_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
    pub entity_type: String,
    pub entity_name: String,
    #[serde(default)]
    pub nv_pairs: BTreeMap<String, String>,
}

impl Keyed for Policy {
    fn key(&self) -> String {
        policy_key(&self.serial_number, &self.template_name, &self.description)
    }
}

impl Policy {
    /// Request body for create and update.
    fn to_body(&self) -> Value {
        let mut body = json!({
            "source": "",
            "serialNumber": self.serial_number,
            "entityType": self.entity_type,
            "entityName": self.entity_name,
            "templateName": self.template_name,
            "priority": self.priority.unwrap_or(DEFAULT_PRIORITY),
            "description": self.description,
            "nvPairs": self.nv_pairs,
        });
        if let Some(id) = &self.policy_id {
            body["policyId"] = Value::String(id.clone());
        }
        body
    }
}

/// Joins serial number, template and description into a `have` key.
pub fn policy_key(serial: &str, template: &str, description: &str) -> String {
    format!("{}/{}/{}", serial, template, description)
}

/// List entry as sent by the controller.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    #[serde(default, deserialize_with = "string_or_default")]
    policy_id: String,
    #[serde(default, deserialize_with = "string_or_default")]
    serial_number: String,
    #[serde(default, deserialize_with = "string_or_default")]
    template_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    description: String,
    #[serde(default, deserialize_with = "lenient_u16")]
    priority: Option<u16>,
    #[serde(default, deserialize_with = "string_or_default")]
    entity_type: String,
    #[serde(default, deserialize_with = "string_or_default")]
    entity_name: String,
    #[serde(default, deserialize_with = "string_map")]
    nv_pairs: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    deleted: bool,
}

impl From<RawPolicy> for Policy {
    fn from(raw: RawPolicy) -> Self {
        Self {
            policy_id: Some(raw.policy_id).filter(|id| !id.is_empty()),
            serial_number: raw.serial_number,
            template_name: raw.template_name,
            description: raw.description,
            priority: raw.priority,
            entity_type: raw.entity_type,
            entity_name: raw.entity_name,
            nv_pairs: raw.nv_pairs,
        }
    }
}

/// Reconciles switch policies.
///
/// - merged: create policies missing from their switch; update policies
///   whose priority or nvPairs differ
/// - deleted: delete policies selected by `policy_id`, or by description
///   (and template, when given), in one request
/// - query: report policies on each switch, filtered by description
pub struct PolicyMgr {
    rest_send: RestSend,
    state: State,
    config: Vec<PolicyConfig>,
    inventories: InventoryCache,
    /// Serial number for each config entry
    serials: Vec<String>,
    want: Vec<Policy>,
    have: BTreeMap<String, Policy>,
    need: Need<Policy>,
    results: Results,
}

impl PolicyMgr {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: Vec<PolicyConfig>) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            rest_send,
            state,
            config,
            inventories: InventoryCache::new(),
            serials: Vec::new(),
            want: Vec::new(),
            have: BTreeMap::new(),
            need: Need::default(),
            results,
        }
    }

    /// Current policies on the configured switches.
    pub fn have(&self) -> &BTreeMap<String, Policy> {
        &self.have
    }

    /// Changes computed by the last run.
    pub fn need(&self) -> &Need<Policy> {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    /// Policies selected by config entries, in have order, once each.
    fn selected(&self) -> Vec<&Policy> {
        self.have
            .values()
            .filter(|policy| {
                self.config
                    .iter()
                    .zip(&self.serials)
                    .any(|(config, serial)| {
                        &policy.serial_number == serial && config.selects(policy)
                    })
            })
            .collect()
    }

    async fn send(
        &mut self,
        action: &str,
        endpoint: &Endpoint,
        diff: Value,
        payload: Option<Value>,
    ) -> NdfcResult<()> {
        self.rest_send
            .commit_with_diff(
                &mut self.results,
                action,
                Some(diff),
                endpoint.verb,
                &endpoint.path,
                payload,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Reconciler for PolicyMgr {
    fn name(&self) -> &str {
        "policy"
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if self.config.is_empty() {
            return Err(NdfcError::invalid_config(
                "config",
                format!("state {} needs at least one policy entry", self.state),
            ));
        }
        for config in &self.config {
            config.validate(self.state)?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        let mut serials = Vec::with_capacity(self.config.len());
        for config in &self.config {
            let serial = self
                .inventories
                .resolve(&self.rest_send, &config.fabric, &config.switch)
                .await?;
            serials.push(serial);
        }

        self.want = match self.state {
            State::Merged => self
                .config
                .iter()
                .zip(&serials)
                .map(|(config, serial)| Policy {
                    policy_id: None,
                    serial_number: serial.clone(),
                    template_name: config.template_name.clone().unwrap_or_default(),
                    description: config.description.clone(),
                    priority: config.priority,
                    entity_type: config.entity_type.clone(),
                    entity_name: config.entity_name.clone(),
                    nv_pairs: config.nv_pairs.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };

        self.have.clear();
        let distinct: BTreeSet<&String> = serials.iter().collect();
        for serial in distinct {
            let endpoint = policies::by_switch(serial);
            let response = self.rest_send.get(&endpoint.path).await?;
            for entry in wire::list_body(&response)? {
                let raw: RawPolicy = serde_json::from_value(entry)?;
                if raw.deleted {
                    continue;
                }
                let policy = Policy::from(raw);
                self.have.insert(policy.key(), policy);
            }
        }
        self.serials = serials;
        debug!(count = self.have.len(), "Fetched have");
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        self.need = match self.state {
            State::Merged => compute_need(&self.want, &self.have, self.state)?,
            State::Deleted => Need {
                delete: self.selected().into_iter().cloned().collect(),
                ..Need::default()
            },
            _ => Need::default(),
        };
        debug!(
            create = self.need.create.len(),
            update = self.need.update.len(),
            delete = self.need.delete.len(),
            "Computed need"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply(&mut self) -> NdfcResult<()> {
        if self.state == State::Query {
            let found = self
                .selected()
                .into_iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            for value in found {
                self.results.register_unchanged("query", value);
            }
            return Ok(());
        }

        let need = std::mem::take(&mut self.need);

        for policy in need.create {
            let body = policy.to_body();
            self.send("create", &policies::create(), body.clone(), Some(body))
                .await?;
            info!(key = %policy.key(), "Created policy");
        }

        for policy in need.update {
            let Some(id) = policy.policy_id.clone() else {
                return Err(NdfcError::internal(format!(
                    "policy {} has no id to update",
                    policy.key()
                )));
            };
            let body = policy.to_body();
            self.send("update", &policies::update(&id), body.clone(), Some(body))
                .await?;
            info!(policy_id = %id, "Updated policy");
        }

        let ids: Vec<String> = need
            .delete
            .iter()
            .filter_map(|p| p.policy_id.clone())
            .collect();
        if !ids.is_empty() {
            let diff = json!({ "policyIds": ids });
            self.send("delete", &policies::delete(&ids), diff, None).await?;
            info!(?ids, "Deleted policies");
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

    fn policy(id: &str, description: &str) -> Policy {
        Policy::from(
            serde_json::from_value::<RawPolicy>(json!({
                "policyId": id,
                "serialNumber": "FDO1",
                "templateName": "switch_freeform",
                "description": description,
                "priority": "500",
                "entityType": "SWITCH",
                "entityName": "SWITCH",
                "nvPairs": {"CONF": "feature lldp", "PRIORITY": 500},
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_validate() {
        let mut config = PolicyConfig::new("f1", "10.1.1.1");
        assert!(config.validate(State::Query).is_ok());
        assert!(config.validate(State::Merged).is_err());
        assert!(config.validate(State::Deleted).is_err());
        assert!(config.validate(State::Replaced).is_err());

        config.template_name = Some("switch_freeform".to_string());
        config.description = "lldp".to_string();
        assert!(config.validate(State::Merged).is_ok());

        config.priority = Some(1001);
        assert!(config.validate(State::Merged).is_err());
    }

    #[test]
    fn test_raw_policy_is_normalized() {
        let p = policy("POLICY-100", "lldp");
        assert_eq!(p.priority, Some(500));
        assert_eq!(p.nv_pairs["PRIORITY"], "500");
        assert_eq!(p.key(), "FDO1/switch_freeform/lldp");
    }

    #[test]
    fn test_selects() {
        let mut config = PolicyConfig::new("f1", "FDO1");
        config.description = "lldp".to_string();
        assert!(config.selects(&policy("POLICY-100", "lldp")));
        assert!(!config.selects(&policy("POLICY-101", "ntp")));

        config.policy_id = Some("POLICY-101".to_string());
        assert!(config.selects(&policy("POLICY-101", "ntp")));

        let everything = PolicyConfig::new("f1", "FDO1");
        assert!(everything.selects(&policy("POLICY-101", "ntp")));
    }

    #[test]
    fn test_body_defaults_priority() {
        let mut p = policy("POLICY-100", "lldp");
        p.priority = None;
        let body = p.to_body();
        assert_eq!(body["priority"], 500);
        assert_eq!(body["policyId"], "POLICY-100");
        assert_eq!(body["source"], "");
    }
}
