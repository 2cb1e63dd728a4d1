//! Helpers for the controller's loosely typed JSON.
//!
//! The same field can arrive as a string, a number or `null` depending on
//! the endpoint and the controller release. The deserializers here accept
//! all of those.

use ndfc_common::{ControllerResponse, NdfcError, NdfcResult};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Renders a scalar as a string. `null` becomes empty.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Deserializes any scalar into a string.
pub fn string_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(&Value::deserialize(deserializer)?))
}

/// Deserializes `true`, `"true"` or `"TRUE"` as true; anything else as false.
pub fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Deserializes a number or numeric string. Empty, `null` and
/// non-numeric values become `None`.
pub fn lenient_u16<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Like [`lenient_u16`], for 32-bit identifiers such as VNIs.
pub fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Deserializes an object of scalars into a string map.
pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

/// Parses a template config, which the controller carries as a JSON
/// document inside a string field.
pub fn parse_template_config(field: &str, text: &str) -> NdfcResult<BTreeMap<String, String>> {
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect()),
        other => Err(NdfcError::invalid_response(
            field,
            format!("expected an object, got {}", other),
        )),
    }
}

/// Splits a comma separated list, dropping empty items.
pub fn split_csv(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Returns the array body of a list GET. A 404 is an empty list.
pub fn list_body(response: &ControllerResponse) -> NdfcResult<Vec<Value>> {
    if response.is_not_found() {
        return Ok(Vec::new());
    }
    match &response.data {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        other => Err(NdfcError::invalid_response(
            response.request_path.clone(),
            format!("expected a list, got {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndfc_common::Verb;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "string_or_default")]
        name: String,
        #[serde(default, deserialize_with = "lenient_bool")]
        flag: bool,
        #[serde(default, deserialize_with = "lenient_u16")]
        vlan: Option<u16>,
        #[serde(default, deserialize_with = "string_map")]
        pairs: BTreeMap<String, String>,
    }

    #[test]
    fn test_lenient_fields() {
        let s: Sample = serde_json::from_value(json!({
            "name": 12,
            "flag": "TRUE",
            "vlan": "100",
            "pairs": {"a": 1, "b": "x", "c": null}
        }))
        .unwrap();
        assert_eq!(s.name, "12");
        assert!(s.flag);
        assert_eq!(s.vlan, Some(100));
        assert_eq!(s.pairs["a"], "1");
        assert_eq!(s.pairs["c"], "");

        let s: Sample = serde_json::from_value(json!({"name": null, "vlan": ""})).unwrap();
        assert_eq!(s.name, "");
        assert!(!s.flag);
        assert_eq!(s.vlan, None);
    }

    #[test]
    fn test_parse_template_config() {
        let parsed = parse_template_config("cfg", r#"{"vlanId": 100, "mtu": "9216"}"#).unwrap();
        assert_eq!(parsed["vlanId"], "100");
        assert_eq!(parsed["mtu"], "9216");
        assert!(parse_template_config("cfg", "").unwrap().is_empty());
        assert!(parse_template_config("cfg", "[1]").is_err());
    }

    #[test]
    fn test_split_csv() {
        assert_eq!(split_csv("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn test_list_body() {
        let ok = ControllerResponse::new(Verb::Get, "/p", 200, "OK", json!([{"a": 1}]));
        assert_eq!(list_body(&ok).unwrap().len(), 1);
        let missing = ControllerResponse::new(Verb::Get, "/p", 404, "Not Found", json!({}));
        assert!(list_body(&missing).unwrap().is_empty());
        let odd = ControllerResponse::new(Verb::Get, "/p", 200, "OK", json!({"a": 1}));
        assert!(list_body(&odd).is_err());
    }
}
