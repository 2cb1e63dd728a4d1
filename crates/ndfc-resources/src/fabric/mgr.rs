//! Fabric manager.

use async_trait::async_trait;
use ndfc_common::{
    compute_need, endpoints, index_by_key, Endpoint, NdfcError, NdfcResult, Need, Reconciler,
    RestSend, Results, State,
};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use super::types::{nv, FabricConfig, FabricPayload};
use crate::wire;

/// Reconciles fabrics.
///
/// - merged: create missing fabrics, PUT changed nvPairs into existing ones
/// - replaced: create missing fabrics, PUT the configured nvPairs with
///   template defaults for the ones left unset
/// - deleted: delete the named fabrics that exist
/// - query: report the named fabrics, or every fabric if none are named
pub struct FabricMgr {
    rest_send: RestSend,
    state: State,
    config: Vec<FabricConfig>,
    want: Vec<FabricPayload>,
    have: BTreeMap<String, FabricPayload>,
    need: Need<FabricPayload>,
    results: Results,
}

impl FabricMgr {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: Vec<FabricConfig>) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            rest_send,
            state,
            config,
            want: Vec::new(),
            have: BTreeMap::new(),
            need: Need::default(),
            results,
        }
    }

    /// Current fabrics, keyed by name.
    pub fn have(&self) -> &BTreeMap<String, FabricPayload> {
        &self.have
    }

    /// Changes computed by the last run.
    pub fn need(&self) -> &Need<FabricPayload> {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    fn config_for(&self, fabric: &str) -> NdfcResult<&FabricConfig> {
        self.config
            .iter()
            .find(|c| c.fabric_name == fabric)
            .ok_or_else(|| NdfcError::internal(format!("no config for fabric {}", fabric)))
    }

    /// Recalculates the configuration of every named fabric.
    #[instrument(skip(self))]
    pub async fn config_save(&mut self) -> NdfcResult<()> {
        for fabric in self.fabric_names()? {
            let endpoint = endpoints::fabrics::config_save(&fabric);
            self.send("config_save", &endpoint, Some(Value::String(fabric.clone())), None)
                .await?;
            info!(fabric = %fabric, "Saved fabric configuration");
        }
        Ok(())
    }

    /// Deploys pending configuration in every named fabric.
    #[instrument(skip(self))]
    pub async fn config_deploy(&mut self) -> NdfcResult<()> {
        for fabric in self.fabric_names()? {
            let endpoint = endpoints::fabrics::config_deploy(&fabric);
            self.send("config_deploy", &endpoint, Some(Value::String(fabric.clone())), None)
                .await?;
            info!(fabric = %fabric, "Deployed fabric configuration");
        }
        Ok(())
    }

    fn fabric_names(&self) -> NdfcResult<Vec<String>> {
        let mut seen = BTreeSet::new();
        for config in &self.config {
            config.validate(State::Query)?;
            seen.insert(config.fabric_name.clone());
        }
        Ok(seen.into_iter().collect())
    }

    async fn send(
        &mut self,
        action: &str,
        endpoint: &Endpoint,
        diff: Option<Value>,
        payload: Option<Value>,
    ) -> NdfcResult<()> {
        self.rest_send
            .commit_with_diff(
                &mut self.results,
                action,
                diff,
                endpoint.verb,
                &endpoint.path,
                payload,
            )
            .await?;
        Ok(())
    }

    async fn create(&mut self, payload: FabricPayload) -> NdfcResult<()> {
        let template = self.config_for(&payload.fabric_name)?.template;
        if template.requires_bgp_as() && !payload.nv_pairs.contains_key(nv::BGP_AS) {
            return Err(NdfcError::invalid_config(
                "bgp_as",
                format!(
                    "fabric {} does not exist and {} fabrics require bgp_as to create",
                    payload.fabric_name, template
                ),
            ));
        }
        let payload = payload.with_create_defaults(template);
        let endpoint = endpoints::fabrics::create(&payload.fabric_name, &payload.template_name);
        let body = serde_json::to_value(&payload.nv_pairs)?;
        self.send("create", &endpoint, Some(body.clone()), Some(body)).await?;
        info!(fabric = %payload.fabric_name, template = %payload.template_name, "Created fabric");
        Ok(())
    }

    async fn update(&mut self, action: &str, payload: FabricPayload) -> NdfcResult<()> {
        let endpoint = endpoints::fabrics::update(&payload.fabric_name, &payload.template_name);
        let body = serde_json::to_value(&payload.nv_pairs)?;
        self.send(action, &endpoint, Some(body.clone()), Some(body)).await?;
        info!(fabric = %payload.fabric_name, action, "Updated fabric");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for FabricMgr {
    fn name(&self) -> &str {
        "fabric"
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if self.state == State::Overridden {
            return Err(NdfcError::invalid_config(
                "state",
                "fabrics support merged, replaced, deleted and query",
            ));
        }
        if self.config.is_empty() && self.state != State::Query {
            return Err(NdfcError::invalid_config(
                "config",
                format!("state {} needs at least one fabric", self.state),
            ));
        }
        for config in &self.config {
            config.validate(self.state)?;
        }
        let replaced = self.state == State::Replaced;
        self.want = self
            .config
            .iter()
            .map(|c| {
                let payload = c.to_payload();
                if replaced {
                    payload.with_create_defaults(c.template)
                } else {
                    payload
                }
            })
            .collect();
        debug!(count = self.want.len(), "Built want");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        let endpoint = endpoints::fabrics::list();
        let response = self.rest_send.get(&endpoint.path).await?;
        let fabrics = wire::list_body(&response)?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<FabricPayload>, _>>()?;
        self.have = index_by_key(fabrics);
        debug!(count = self.have.len(), "Fetched have");
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        for want in &self.want {
            if let Some(have) = self.have.get(&want.fabric_name) {
                if matches!(self.state, State::Merged | State::Replaced)
                    && have.template_name != want.template_name
                {
                    return Err(NdfcError::invalid_config(
                        "template",
                        format!(
                            "fabric {} exists with template {}, cannot change it to {}",
                            want.fabric_name, have.template_name, want.template_name
                        ),
                    ));
                }
            }
        }

        // Replaced compares the nvPairs the user set plus the template
        // defaults; parameters the controller owns are left out.
        let have = if self.state == State::Replaced {
            self.want
                .iter()
                .filter_map(|w| {
                    self.have
                        .get(&w.fabric_name)
                        .map(|h| (w.fabric_name.clone(), h.project(&w.nv_pairs)))
                })
                .collect()
        } else {
            self.have.clone()
        };

        self.need = compute_need(&self.want, &have, self.state)?;
        debug!(
            create = self.need.create.len(),
            update = self.need.update.len(),
            replace = self.need.replace.len(),
            delete = self.need.delete.len(),
            "Computed need"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn apply(&mut self) -> NdfcResult<()> {
        if self.state == State::Query {
            let names: BTreeSet<&str> = self.want.iter().map(|w| w.fabric_name.as_str()).collect();
            for (name, fabric) in &self.have {
                if names.is_empty() || names.contains(name.as_str()) {
                    let value = serde_json::to_value(fabric)?;
                    self.results.register_unchanged("query", value);
                }
            }
            return Ok(());
        }

        for payload in std::mem::take(&mut self.need.create) {
            self.create(payload).await?;
        }
        for payload in std::mem::take(&mut self.need.update) {
            self.update("update", payload).await?;
        }
        for payload in std::mem::take(&mut self.need.replace) {
            self.update("replace", payload).await?;
        }
        for payload in std::mem::take(&mut self.need.delete) {
            let endpoint = endpoints::fabrics::delete(&payload.fabric_name);
            let diff = Value::String(payload.fabric_name.clone());
            self.send("delete", &endpoint, Some(diff), None).await?;
            info!(fabric = %payload.fabric_name, "Deleted fabric");
        }
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}
