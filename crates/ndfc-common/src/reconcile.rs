//! The want/have/need reconciliation engine.
//!
//! Every resource manager follows the same four steps:
//!
//! 1. `want`: desired objects, built from validated user configuration
//! 2. `have`: current objects, fetched from the controller and keyed by name
//! 3. `need`: the delta, computed by [`compute_need`]
//! 4. apply `need` with REST calls
//!
//! [`Reconciler`] drives these steps; implementations fill in each one.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{NdfcError, NdfcResult};
use crate::results::Results;

/// Desired end state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    /// Create missing objects, merge changes into existing ones.
    Merged,
    /// Delete the named objects.
    Deleted,
    /// Report current objects, change nothing.
    Query,
    /// Create missing objects, replace existing ones with the desired state.
    Replaced,
    /// Like replaced, and delete every object not in the desired state.
    Overridden,
}

impl State {
    /// Returns the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Merged => "merged",
            State::Deleted => "deleted",
            State::Query => "query",
            State::Replaced => "replaced",
            State::Overridden => "overridden",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = NdfcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "merged" => Ok(State::Merged),
            "deleted" => Ok(State::Deleted),
            "query" => Ok(State::Query),
            "replaced" => Ok(State::Replaced),
            "overridden" => Ok(State::Overridden),
            other => Err(NdfcError::invalid_config(
                "state",
                format!(
                    "unknown state '{}', expected one of merged, deleted, query, replaced, overridden",
                    other
                ),
            )),
        }
    }
}

/// Objects that have a unique key on the controller.
pub trait Keyed {
    /// Returns the key used to match `want` against `have`.
    fn key(&self) -> String;
}

/// The delta between `want` and `have`.
#[derive(Debug, Clone, PartialEq)]
pub struct Need<T> {
    /// Wanted objects absent from `have`.
    pub create: Vec<T>,
    /// Existing objects with `want` merged over them (merged state).
    pub update: Vec<T>,
    /// Wanted objects that replace existing ones (replaced/overridden).
    pub replace: Vec<T>,
    /// Existing objects to delete, as found in `have`.
    pub delete: Vec<T>,
}

impl<T> Default for Need<T> {
    fn default() -> Self {
        Self {
            create: Vec::new(),
            update: Vec::new(),
            replace: Vec::new(),
            delete: Vec::new(),
        }
    }
}

impl<T> Need<T> {
    /// Returns true if nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update.is_empty()
            && self.replace.is_empty()
            && self.delete.is_empty()
    }

    /// Total number of changes.
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.replace.len() + self.delete.len()
    }
}

/// Deep-merges `overlay` over `base`.
///
/// Objects are merged key by key, recursively. Any other overlay value
/// replaces the base value, except `null`, which leaves the base value in
/// place.
pub fn merge_json(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (_, Value::Null) => base.clone(),
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let entry = match base_map.get(key) {
                    Some(existing) => merge_json(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// Computes what must change to move `have` to `want` for `state`.
///
/// - merged: absent -> create; present and different after merging want
///   over have -> update (with the merged object); identical -> skip
/// - replaced: absent -> create; present and different -> replace
/// - overridden: as replaced, plus every `have` key not in `want` -> delete
/// - deleted: wanted keys present in `have` -> delete; absent -> skip
/// - query: nothing
pub fn compute_need<T>(want: &[T], have: &BTreeMap<String, T>, state: State) -> NdfcResult<Need<T>>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    let mut need = Need::default();

    match state {
        State::Query => {}
        State::Deleted => {
            let mut seen = BTreeSet::new();
            for item in want {
                let key = item.key();
                if !seen.insert(key.clone()) {
                    continue;
                }
                match have.get(&key) {
                    Some(existing) => need.delete.push(existing.clone()),
                    None => debug!(key = %key, "Not present, nothing to delete"),
                }
            }
        }
        State::Merged | State::Replaced | State::Overridden => {
            let mut seen: BTreeMap<String, Value> = BTreeMap::new();
            for item in want {
                let key = item.key();
                let want_value = serde_json::to_value(item)?;
                match seen.get(&key) {
                    Some(first) if *first == want_value => {
                        debug!(key = %key, "Duplicate entry, skipping");
                        continue;
                    }
                    Some(_) => {
                        return Err(NdfcError::invalid_config(
                            "config",
                            format!("{} is listed more than once with different settings", key),
                        ))
                    }
                    None => {
                        seen.insert(key.clone(), want_value.clone());
                    }
                }

                let Some(existing) = have.get(&key) else {
                    need.create.push(item.clone());
                    continue;
                };

                let have_value = serde_json::to_value(existing)?;

                if state == State::Merged {
                    let merged = merge_json(&have_value, &want_value);
                    if merged != have_value {
                        need.update.push(serde_json::from_value(merged)?);
                    } else {
                        debug!(key = %key, "Already in desired state");
                    }
                } else if want_value != have_value {
                    need.replace.push(item.clone());
                } else {
                    debug!(key = %key, "Already in desired state");
                }
            }

            if state == State::Overridden {
                let wanted: BTreeSet<String> = want.iter().map(Keyed::key).collect();
                need.delete.extend(
                    have.iter()
                        .filter(|(key, _)| !wanted.contains(*key))
                        .map(|(_, existing)| existing.clone()),
                );
            }
        }
    }

    Ok(need)
}

/// Builds a `have` map from a list of objects.
pub fn index_by_key<T: Keyed>(items: impl IntoIterator<Item = T>) -> BTreeMap<String, T> {
    items.into_iter().map(|item| (item.key(), item)).collect()
}

/// A resource manager that reconciles one kind of controller object.
///
/// # Example
///
/// ```ignore
/// use ndfc_common::{Reconciler, Results, State, NdfcResult};
///
/// struct MyMgr { /* want, have, need, results */ }
///
/// #[async_trait]
/// impl Reconciler for MyMgr {
///     fn name(&self) -> &str { "my-resource" }
///     fn state(&self) -> State { State::Merged }
///     fn build_want(&mut self) -> NdfcResult<()> { /* validate config */ Ok(()) }
///     async fn fetch_have(&mut self) -> NdfcResult<()> { /* GET */ Ok(()) }
///     fn build_need(&mut self) -> NdfcResult<()> { /* compute_need */ Ok(()) }
///     async fn apply(&mut self) -> NdfcResult<()> { /* POST/PUT/DELETE */ Ok(()) }
///     fn results(&self) -> &Results { &self.results }
/// }
/// ```
#[async_trait]
pub trait Reconciler: Send {
    /// Returns the resource name (for logging).
    fn name(&self) -> &str;

    /// Returns the state this manager reconciles towards.
    fn state(&self) -> State;

    /// Validates user configuration and builds `want`.
    fn build_want(&mut self) -> NdfcResult<()>;

    /// Fetches `have` from the controller.
    async fn fetch_have(&mut self) -> NdfcResult<()>;

    /// Computes `need` from `want` and `have`.
    fn build_need(&mut self) -> NdfcResult<()>;

    /// Issues the REST calls for `need`.
    async fn apply(&mut self) -> NdfcResult<()>;

    /// Returns the accumulated results.
    fn results(&self) -> &Results;

    /// Runs all four steps. The first error aborts the run.
    async fn reconcile(&mut self) -> NdfcResult<()> {
        info!(resource = self.name(), state = %self.state(), "Reconciling");
        self.build_want()?;
        self.fetch_have().await?;
        self.build_need()?;
        self.apply().await?;
        info!(
            resource = self.name(),
            changed = self.results().changed(),
            tasks = self.results().len(),
            "Reconcile complete"
        );
        Ok(())
    }
}
