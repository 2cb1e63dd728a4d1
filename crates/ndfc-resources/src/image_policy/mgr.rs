//! Reconciler for image policies.

use async_trait::async_trait;
use ndfc_common::endpoints::image_policies;
use ndfc_common::{
    compute_need, index_by_key, Endpoint, Keyed, NdfcError, NdfcResult, Need, Reconciler,
    RestSend, Results, State,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

use super::types::{ImagePolicy, ImagePolicyConfig, RawImagePolicy};

/// Reconciles image policies.
///
/// - merged: create missing policies; edit existing ones with the
///   configured fields merged over the current ones
/// - replaced: create missing policies; edit existing ones to exactly the
///   configured fields
/// - overridden: as replaced, and delete every policy not configured
/// - deleted: delete the named policies that exist, in one request
/// - query: report the named policies, or every policy if none are named
pub struct ImagePolicyMgr {
    rest_send: RestSend,
    state: State,
    config: Vec<ImagePolicyConfig>,
    want: Vec<ImagePolicy>,
    have: BTreeMap<String, ImagePolicy>,
    /// Switches using each policy, from the last fetch
    ref_counts: BTreeMap<String, u32>,
    need: Need<ImagePolicy>,
    results: Results,
}

impl ImagePolicyMgr {
    /// Creates a manager for `config`.
    pub fn new(rest_send: RestSend, state: State, config: Vec<ImagePolicyConfig>) -> Self {
        let results = Results::new(state, rest_send.check_mode());
        Self {
            rest_send,
            state,
            config,
            want: Vec::new(),
            have: BTreeMap::new(),
            ref_counts: BTreeMap::new(),
            need: Need::default(),
            results,
        }
    }

    /// Current policies, keyed by name.
    pub fn have(&self) -> &BTreeMap<String, ImagePolicy> {
        &self.have
    }

    /// Changes computed by the last run.
    pub fn need(&self) -> &Need<ImagePolicy> {
        &self.need
    }

    /// Consumes the manager, returning its results.
    pub fn into_results(self) -> Results {
        self.results
    }

    async fn post(&mut self, action: &str, endpoint: &Endpoint, policy: &ImagePolicy) -> NdfcResult<()> {
        let body = policy.to_body();
        self.rest_send
            .commit_with_results(
                &mut self.results,
                action,
                endpoint.verb,
                &endpoint.path,
                Some(body),
            )
            .await?;
        info!(policy = %policy.policy_name, action, "Applied image policy");
        Ok(())
    }
}

#[async_trait]
impl Reconciler for ImagePolicyMgr {
    fn name(&self) -> &str {
        "image-policy"
    }

    fn state(&self) -> State {
        self.state
    }

    fn build_want(&mut self) -> NdfcResult<()> {
        if self.config.is_empty() && !matches!(self.state, State::Query | State::Overridden) {
            return Err(NdfcError::invalid_config(
                "config",
                format!("state {} needs at least one image policy", self.state),
            ));
        }
        for config in &self.config {
            config.validate(self.state)?;
        }

        let complete = matches!(self.state, State::Replaced | State::Overridden);
        self.want = self
            .config
            .iter()
            .map(|c| {
                let policy = c.to_policy();
                if complete {
                    policy.with_defaults()
                } else {
                    policy
                }
            })
            .collect();
        debug!(count = self.want.len(), "Built want");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_have(&mut self) -> NdfcResult<()> {
        let endpoint = image_policies::list();
        let response = self.rest_send.get(&endpoint.path).await?;

        let entries = match response.data.get("lastOperDataObject") {
            Some(Value::Array(entries)) => entries.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(NdfcError::invalid_response(
                    endpoint.path,
                    format!("expected lastOperDataObject to be a list, got {}", other),
                ))
            }
        };

        let raw = entries
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<RawImagePolicy>, _>>()?;
        self.ref_counts = raw
            .iter()
            .map(|r| (r.policy_name.clone(), r.ref_count))
            .collect();
        self.have = index_by_key(raw.into_iter().map(ImagePolicy::from));
        debug!(count = self.have.len(), "Fetched have");
        Ok(())
    }

    fn build_need(&mut self) -> NdfcResult<()> {
        self.need = compute_need(&self.want, &self.have, self.state)?;

        for policy in &self.need.create {
            if policy.platform.is_none() || policy.nxos_version.is_none() {
                return Err(NdfcError::invalid_config(
                    "platform",
                    format!(
                        "image policy {} does not exist; platform and release are required to create it",
                        policy.policy_name
                    ),
                ));
            }
        }
        for policy in &self.need.delete {
            let refs = self.ref_counts.get(&policy.policy_name).copied().unwrap_or(0);
            if refs > 0 {
                return Err(NdfcError::invalid_config(
                    "name",
                    format!(
                        "image policy {} is attached to {} switches and cannot be deleted",
                        policy.policy_name, refs
                    ),
                ));
            }
        }

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
            let named: BTreeSet<&str> = self.config.iter().map(|c| c.name.as_str()).collect();
            let found = self
                .have
                .values()
                .filter(|p| named.is_empty() || named.contains(p.policy_name.as_str()))
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            for value in found {
                self.results.register_unchanged("query", value);
            }
            return Ok(());
        }

        let need = std::mem::take(&mut self.need);

        for policy in need.create {
            let policy = policy.with_defaults();
            self.post("create", &image_policies::create(), &policy).await?;
        }
        for policy in need.update {
            self.post("update", &image_policies::edit(), &policy).await?;
        }
        for policy in need.replace {
            self.post("replace", &image_policies::edit(), &policy).await?;
        }

        let names: Vec<String> = need.delete.iter().map(Keyed::key).collect();
        if !names.is_empty() {
            let endpoint = image_policies::delete();
            let body = json!({ "policyNames": names });
            self.rest_send
                .commit_with_results(
                    &mut self.results,
                    "delete",
                    endpoint.verb,
                    &endpoint.path,
                    Some(body),
                )
                .await?;
            info!(?names, "Deleted image policies");
        }
        Ok(())
    }

    fn results(&self) -> &Results {
        &self.results
    }
}
