//! Traits implemented by VRFs and networks.

use ndfc_common::{Endpoint, Keyed, NdfcResult, State};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// An overlay object that lives in one fabric and carries its parameters
/// in a template config.
pub trait TopDownObject:
    Keyed + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Object kind, for logs and results
    const KIND: &'static str;

    /// Name of the JSON field holding the template config
    const TEMPLATE_CONFIG_FIELD: &'static str;

    fn fabric(&self) -> &str;

    fn name(&self) -> &str;

    fn list_endpoint(fabric: &str) -> Endpoint;

    fn create_endpoint(fabric: &str) -> Endpoint;

    fn update_endpoint(fabric: &str, name: &str) -> Endpoint;

    fn bulk_delete_endpoint(fabric: &str, names: &[String]) -> Endpoint;

    /// Fills template parameters the user left unset with their defaults.
    fn with_defaults(self) -> Self;

    /// Parses one entry of the controller's list reply.
    fn from_controller(value: Value) -> NdfcResult<Self>;

    /// Builds the request body. The controller wants the template config
    /// as a JSON document inside a string.
    fn to_body(&self) -> NdfcResult<Value> {
        let mut body = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut body {
            if let Some(config) = map.get(Self::TEMPLATE_CONFIG_FIELD) {
                let rendered = Value::String(serde_json::to_string(config)?);
                map.insert(Self::TEMPLATE_CONFIG_FIELD.to_string(), rendered);
            }
        }
        Ok(body)
    }
}

/// User configuration that produces a [`TopDownObject`].
pub trait TopDownConfig: Debug + Send + Sync + 'static {
    type Object: TopDownObject;

    fn fabric(&self) -> &str;

    /// Object name. Empty selects every object in the fabric, which only
    /// query and deleted accept.
    fn name(&self) -> &str;

    fn validate(&self, state: State) -> NdfcResult<()>;

    /// Builds the object from the fields the user set.
    fn to_object(&self) -> Self::Object;
}

/// Joins a fabric and an object name into a `have` key.
pub fn object_key(fabric: &str, name: &str) -> String {
    format!("{}/{}", fabric, name)
}

/// Keeps only the template parameters in `keys`.
pub fn retain_keys(config: &mut BTreeMap<String, String>, keys: &[&str]) {
    config.retain(|k, _| keys.contains(&k.as_str()));
}

/// Inserts `defaults` for keys not already set.
pub fn fill_defaults(config: &mut BTreeMap<String, String>, defaults: &[(&str, &str)]) {
    for (key, value) in defaults {
        config
            .entry((*key).to_string())
            .or_insert_with(|| (*value).to_string());
    }
}
