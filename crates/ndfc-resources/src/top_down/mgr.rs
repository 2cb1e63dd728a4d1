//! Generic manager for VRFs and networks.

use async_trait::async_trait;
use ndfc_common::{
    compute_need, Endpoint, Keyed, NdfcError, NdfcResult, Need, Reconciler, RestSend, Results,
    State,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use super::object::{object_key, TopDownConfig, TopDownObject};
use crate::wire;

/// Reconciles VRFs or networks.
///
/// `have` covers every fabric named in the configuration, so overridden
/// deletes unlisted objects only in those fabrics.
pub struct TopDownMgr<C: TopDownConfig> {
    rest_send: RestSend,
    state: State,
    config: Vec<C>,
    want: Vec<C::Object>,
    have: BTreeMap<String, C::Object>,
    need: Need<C::Object>,
    results: Results,
}

impl<C: TopDownConfig> TopDownMgr<C> {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: Vec<C>) -> Self {
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

    /// Current objects, keyed by `fabric/name`.
    pub fn have(&self) -> &BTreeMap<String, C::Object> {
        &self.have
    }

    /// Changes computed by the last run.
    pub fn need(&self) -> &Need<C::Object> {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    fn fabrics(&self) -> BTreeSet<String> {
        self.config.iter().map(|c| c.fabric().to_string()).collect()
    }

    /// Objects selected by a config entry with an empty name.
    fn whole_fabrics(&self) -> BTreeSet<&str> {
        self.config
            .iter()
            .filter(|c| c.name().is_empty())
            .map(|c| c.fabric())
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

    async fn delete(&mut self, objects: Vec<C::Object>) -> NdfcResult<()> {
        let mut by_fabric: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for object in objects {
            by_fabric
                .entry(object.fabric().to_string())
                .or_default()
                .push(object.name().to_string());
        }

        for (fabric, names) in by_fabric {
            let endpoint = C::Object::bulk_delete_endpoint(&fabric, &names);
            let diff = json!({"fabric": fabric, "names": names});
            self.send("delete", &endpoint, diff, None).await?;
            info!(kind = C::Object::KIND, fabric = %fabric, ?names, "Deleted");
        }
        Ok(())
    }
}

#[async_trait]
impl<C: TopDownConfig> Reconciler for TopDownMgr<C> {
    fn name(&self) -> &str {
        C::Object::KIND
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if self.config.is_empty() {
            return Err(NdfcError::invalid_config(
                "config",
                format!("state {} needs at least one {} entry", self.state, C::Object::KIND),
            ));
        }
        for config in &self.config {
            config.validate(self.state)?;
        }

        let complete = matches!(self.state, State::Replaced | State::Overridden);
        self.want = self
            .config
            .iter()
            .filter(|c| !c.name().is_empty())
            .map(|c| {
                let object = c.to_object();
                if complete {
                    object.with_defaults()
                } else {
                    object
                }
            })
            .collect();
        debug!(kind = C::Object::KIND, count = self.want.len(), "Built want");
        Ok(())
    }

    #[instrument(skip(self), fields(kind = C::Object::KIND))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        self.have.clear();
        for fabric in self.fabrics() {
            let endpoint = C::Object::list_endpoint(&fabric);
            let response = self.rest_send.get(&endpoint.path).await?;
            for entry in wire::list_body(&response)? {
                let object = C::Object::from_controller(entry)?;
                self.have.insert(object.key(), object);
            }
        }
        debug!(count = self.have.len(), "Fetched have");
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        self.need = compute_need(&self.want, &self.have, self.state)?;

        if self.state == State::Deleted {
            let whole = self.whole_fabrics();
            let queued: BTreeSet<String> = self.need.delete.iter().map(|o| o.key()).collect();
            let extra: Vec<C::Object> = self
                .have
                .values()
                .filter(|o| whole.contains(o.fabric()) && !queued.contains(&o.key()))
                .cloned()
                .collect();
            self.need.delete.extend(extra);
        }

        debug!(
            kind = C::Object::KIND,
            create = self.need.create.len(),
            update = self.need.update.len(),
            replace = self.need.replace.len(),
            delete = self.need.delete.len(),
            "Computed need"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(kind = C::Object::KIND))]
    async fn apply(&mut self) -> NdfcResult<()> {
        if self.state == State::Query {
            let whole = self.whole_fabrics();
            let named: BTreeSet<String> = self
                .config
                .iter()
                .filter(|c| !c.name().is_empty())
                .map(|c| object_key(c.fabric(), c.name()))
                .collect();
            let found: Vec<Value> = self
                .have
                .iter()
                .filter(|(key, o)| whole.contains(o.fabric()) || named.contains(*key))
                .map(|(_, o)| serde_json::to_value(o))
                .collect::<Result<_, _>>()?;
            for value in found {
                self.results.register_unchanged("query", value);
            }
            return Ok(());
        }

        // Deletes go first so overridden can reuse names and VNIs.
        let deletes = std::mem::take(&mut self.need.delete);
        if !deletes.is_empty() {
            self.delete(deletes).await?;
        }

        for object in std::mem::take(&mut self.need.create) {
            let object = object.with_defaults();
            let endpoint = C::Object::create_endpoint(object.fabric());
            let body = object.to_body()?;
            self.send("create", &endpoint, serde_json::to_value(&object)?, Some(body))
                .await?;
            info!(kind = C::Object::KIND, key = %object.key(), "Created");
        }

        let updates = std::mem::take(&mut self.need.update)
            .into_iter()
            .map(|o| ("update", o))
            .chain(
                std::mem::take(&mut self.need.replace)
                    .into_iter()
                    .map(|o| ("replace", o)),
            );
        for (action, object) in updates.collect::<Vec<_>>() {
            let endpoint = C::Object::update_endpoint(object.fabric(), object.name());
            let body = object.to_body()?;
            self.send(action, &endpoint, serde_json::to_value(&object)?, Some(body))
                .await?;
            info!(kind = C::Object::KIND, key = %object.key(), action, "Updated");
        }
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}
