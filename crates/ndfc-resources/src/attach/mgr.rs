//! Attachment manager for VRFs and networks.

use async_trait::async_trait;
use ndfc_common::{
    compute_need, Endpoint, Keyed, NdfcError, NdfcResult, Need, Reconciler, RestSend, Results,
    State,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use super::types::{
    attachment_key, normalize_freeform, normalize_ports, AttachConfig, AttachKind, Attachment,
    RawLanAttach,
};
use crate::inventory::InventoryCache;
use crate::wire::{self, split_csv};

/// Reconciles switch attachments of VRFs or networks.
///
/// - merged: attach listed switches; for networks, add listed ports
/// - replaced: attach listed switches with exactly the listed ports
/// - overridden: as replaced, and detach every other switch of each
///   listed object
/// - deleted: detach listed switches, or every switch if none are listed
/// - query: report current attachments of each listed object
///
/// Switches given by IP are resolved against the fabric inventory, so
/// `want` is completed in [`fetch_have`](Reconciler::fetch_have).
pub struct AttachMgr {
    kind: AttachKind,
    rest_send: RestSend,
    state: State,
    config: Vec<AttachConfig>,
    inventories: InventoryCache,
    want: Vec<Attachment>,
    /// Attachment keys whose change is followed by a deploy
    deploy_keys: BTreeSet<String>,
    have: BTreeMap<String, Attachment>,
    need: Need<Attachment>,
    results: Results,
}

impl AttachMgr {
    /// Creates a manager for `config`.
    pub fn new(kind: AttachKind, rest_send: RestSend, state: State, config: Vec<AttachConfig>) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            kind,
            rest_send,
            state,
            config,
            inventories: InventoryCache::new(),
            want: Vec::new(),
            deploy_keys: BTreeSet::new(),
            have: BTreeMap::new(),
            need: Need::default(),
            results,
        }
    }

    /// Desired attachments, after switch resolution.
    pub fn want(&self) -> &[Attachment] {
        &self.want
    }

    /// Current attachments, keyed by `fabric/name/serial`.
    pub fn have(&self) -> &BTreeMap<String, Attachment> {
        &self.have
    }

    /// Changes computed by the last run.
    pub fn need(&self) -> &Need<Attachment> {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    /// Object names per fabric.
    fn objects_by_fabric(&self) -> BTreeMap<String, Vec<String>> {
        let mut by_fabric: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for config in &self.config {
            by_fabric
                .entry(config.fabric.clone())
                .or_default()
                .insert(config.name.clone());
        }
        by_fabric
            .into_iter()
            .map(|(fabric, names)| (fabric, names.into_iter().collect()))
            .collect()
    }

    async fn send(
        &mut self,
        action: &str,
        endpoint: &Endpoint,
        payload: Value,
    ) -> NdfcResult<()> {
        self.rest_send
            .commit_with_results(
                &mut self.results,
                action,
                endpoint.verb,
                &endpoint.path,
                Some(payload),
            )
            .await?;
        Ok(())
    }

    /// Deploys every configured object.
    #[instrument(skip(self), fields(kind = %self.kind))]
    pub async fn deploy(&mut self) -> NdfcResult<()> {
        for config in &self.config {
            config.validate(self.kind, State::Query)?;
        }
        for (fabric, names) in self.objects_by_fabric() {
            self.deploy_objects(&fabric, &names).await?;
        }
        Ok(())
    }

    async fn deploy_objects(&mut self, fabric: &str, names: &[String]) -> NdfcResult<()> {
        let endpoint = self.kind.deploy_endpoint(fabric);
        let body = json!({ self.kind.names_field(): names.join(",") });
        self.send("deploy", &endpoint, body).await?;
        info!(kind = %self.kind, fabric, ?names, "Deployed");
        Ok(())
    }

    async fn resolve_want(&mut self) -> NdfcResult<()> {
        let mut want = Vec::new();
        let mut deploy_keys = BTreeSet::new();
        for config in &self.config {
            for switch in &config.switches {
                let serial = self
                    .inventories
                    .resolve(&self.rest_send, &config.fabric, switch.switch())
                    .await?;
                let attachment = Attachment {
                    fabric: config.fabric.clone(),
                    name: config.name.clone(),
                    serial_number: serial,
                    vlan: switch.vlan,
                    ports: normalize_ports(switch.ports.iter().cloned()),
                    freeform_config: normalize_freeform(switch.freeform_config.clone()),
                };
                if switch.deploy.unwrap_or(config.deploy) {
                    deploy_keys.insert(attachment.key());
                }
                want.push(attachment);
            }
        }
        self.want = want;
        self.deploy_keys = deploy_keys;
        Ok(())
    }

    fn parse_attachments(&self, fabric: &str, data: Vec<Value>) -> NdfcResult<Vec<Attachment>> {
        let name_field = self.kind.name_field();
        let mut found = Vec::new();
        for object in data {
            let name = object
                .get(name_field)
                .map(wire::value_to_string)
                .ok_or_else(|| {
                    NdfcError::invalid_response(
                        format!("{} attachments", self.kind),
                        format!("entry without {}", name_field),
                    )
                })?;
            let list = object
                .get("lanAttachList")
                .cloned()
                .unwrap_or(Value::Array(Vec::new()));
            let entries: Vec<RawLanAttach> = serde_json::from_value(list)?;
            for entry in entries.into_iter().filter(|e| e.is_lan_attached) {
                let key = attachment_key(fabric, &name, &entry.switch_serial_no);
                // When the controller does not report freeform config, take
                // the wanted one so it does not count as a difference.
                let freeform_config = match entry.freeform_config {
                    Some(reported) => normalize_freeform(Some(reported)),
                    None => self
                        .want
                        .iter()
                        .find(|w| w.key() == key)
                        .and_then(|w| w.freeform_config.clone()),
                };
                found.push(Attachment {
                    fabric: fabric.to_string(),
                    name: name.clone(),
                    serial_number: entry.switch_serial_no,
                    vlan: entry.vlan_id,
                    ports: normalize_ports(split_csv(&entry.port_names)),
                    freeform_config,
                });
            }
        }
        Ok(found)
    }

    /// Ports attached now but absent from `want`.
    fn ports_to_detach(&self, want: &Attachment) -> Vec<String> {
        match self.have.get(&want.key()) {
            Some(have) if self.kind == AttachKind::Network => have
                .ports
                .iter()
                .filter(|p| !want.ports.contains(p))
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Reconciler for AttachMgr {
    fn name(&self) -> &str {
        match self.kind {
            AttachKind::Vrf => "vrf-attach",
            AttachKind::Network => "network-attach",
        }
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if self.config.is_empty() {
            return Err(NdfcError::invalid_config(
                "config",
                format!("state {} needs at least one {} entry", self.state, self.kind),
            ));
        }
        for config in &self.config {
            config.validate(self.kind, self.state)?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        self.resolve_want().await?;

        self.have.clear();
        for (fabric, names) in self.objects_by_fabric() {
            let endpoint = self.kind.attachments_endpoint(&fabric, &names);
            let response = self.rest_send.get(&endpoint.path).await?;
            let data = wire::list_body(&response)?;
            for attachment in self.parse_attachments(&fabric, data)? {
                self.have.insert(attachment.key(), attachment);
            }
        }
        debug!(want = self.want.len(), have = self.have.len(), "Fetched have");
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        for want in &mut self.want {
            let Some(have) = self.have.get(&attachment_key(
                &want.fabric,
                &want.name,
                &want.serial_number,
            )) else {
                continue;
            };
            if want.vlan.is_none() {
                want.vlan = have.vlan;
            }
            if self.state == State::Merged && self.kind == AttachKind::Network {
                want.ports = normalize_ports(have.ports.iter().chain(&want.ports).cloned());
            }
        }

        self.need = compute_need(&self.want, &self.have, self.state)?;

        if self.state == State::Deleted {
            let whole: BTreeSet<String> = self
                .config
                .iter()
                .filter(|c| c.switches.is_empty())
                .map(|c| format!("{}/{}", c.fabric, c.name))
                .collect();
            let queued: BTreeSet<String> = self.need.delete.iter().map(|a| a.key()).collect();
            let extra: Vec<Attachment> = self
                .have
                .values()
                .filter(|a| whole.contains(&a.object_key()) && !queued.contains(&a.key()))
                .cloned()
                .collect();
            self.need.delete.extend(extra);
        }

        debug!(
            attach = self.need.create.len() + self.need.update.len() + self.need.replace.len(),
            detach = self.need.delete.len(),
            "Computed need"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(kind = %self.kind))]
    async fn apply(&mut self) -> NdfcResult<()> {
        if self.state == State::Query {
            let values = self
                .have
                .values()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            for value in values {
                self.results.register_unchanged("query", value);
            }
            return Ok(());
        }

        // Detaching every switch of an object follows the entry's deploy flag
        let whole_objects: BTreeSet<String> = self
            .config
            .iter()
            .filter(|c| c.switches.is_empty() && c.deploy)
            .map(|c| format!("{}/{}", c.fabric, c.name))
            .collect();

        // fabric -> object name -> lanAttachList
        let mut bodies: BTreeMap<String, BTreeMap<String, Vec<Value>>> = BTreeMap::new();
        // fabric -> object names to deploy
        let mut deploy: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let attach = self
            .need
            .create
            .iter()
            .chain(&self.need.update)
            .chain(&self.need.replace)
            .map(|a| (a, true));
        let detach = self.need.delete.iter().map(|a| (a, false));
        for (attachment, attached) in attach.chain(detach) {
            let entry = if attached {
                attachment.lan_attach(self.kind, true, &self.ports_to_detach(attachment))
            } else {
                attachment.lan_attach(self.kind, false, &attachment.ports)
            };
            bodies
                .entry(attachment.fabric.clone())
                .or_default()
                .entry(attachment.name.clone())
                .or_default()
                .push(entry);
            if self.deploy_keys.contains(&attachment.key())
                || whole_objects.contains(&attachment.object_key())
            {
                deploy
                    .entry(attachment.fabric.clone())
                    .or_default()
                    .insert(attachment.name.clone());
            }
        }
        self.need = Need::default();

        let name_field = self.kind.name_field();
        for (fabric, objects) in bodies {
            let to_deploy: Vec<String> = deploy
                .remove(&fabric)
                .map(|names| names.into_iter().collect())
                .unwrap_or_default();
            let body: Vec<Value> = objects
                .into_iter()
                .map(|(name, list)| json!({ name_field: name, "lanAttachList": list }))
                .collect();

            let endpoint = self.kind.attach_endpoint(&fabric);
            self.send("attach", &endpoint, Value::Array(body)).await?;
            info!(kind = %self.kind, fabric = %fabric, "Updated attachments");

            if !to_deploy.is_empty() {
                self.deploy_objects(&fabric, &to_deploy).await?;
            }
        }
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}
