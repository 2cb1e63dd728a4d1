//! Interpretation of controller responses.
//!
//! The controller is not consistent about where it puts error text, so
//! [`ResponseHandler::error_message`] looks in every place we have seen
//! it used.

use serde::Serialize;
use serde_json::Value;

use crate::sender::{ControllerResponse, Verb};

/// Outcome of evaluating one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseResult {
    /// The request did what was asked
    pub success: bool,
    /// A GET found the object
    pub found: bool,
    /// A write changed controller state
    pub changed: bool,
}

/// Evaluates controller responses.
pub struct ResponseHandler;

impl ResponseHandler {
    /// Evaluates a response according to the verb that produced it.
    ///
    /// - GET: 200 means found; 404 means the object does not exist, which
    ///   is still a successful query.
    /// - POST/PUT/DELETE: any 2xx without an error key in the body is a
    ///   successful change.
    pub fn evaluate(response: &ControllerResponse) -> ResponseResult {
        match response.method {
            Verb::Get => Self::evaluate_get(response),
            Verb::Post | Verb::Put | Verb::Delete => Self::evaluate_write(response),
        }
    }

    fn evaluate_get(response: &ControllerResponse) -> ResponseResult {
        match response.return_code {
            200 => ResponseResult {
                success: true,
                found: true,
                changed: false,
            },
            404 => ResponseResult {
                success: true,
                found: false,
                changed: false,
            },
            _ => ResponseResult::default(),
        }
    }

    fn evaluate_write(response: &ControllerResponse) -> ResponseResult {
        let ok = response.is_success() && !has_error_key(&response.data);
        ResponseResult {
            success: ok,
            found: false,
            changed: ok,
        }
    }

    /// Extracts a human readable error message from a response.
    pub fn error_message(response: &ControllerResponse) -> String {
        message_from(&response.data)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if response.data.is_null() {
                    response.message.clone()
                } else {
                    format!("{} {}", response.message, response.data)
                }
            })
    }
}

fn has_error_key(data: &Value) -> bool {
    match data {
        Value::Object(map) => map.contains_key("ERROR") || map.contains_key("error"),
        _ => false,
    }
}

fn message_from(data: &Value) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            for key in ["message", "MESSAGE", "ERROR", "error", "DATA", "raw"] {
                if let Some(found) = map.get(key).and_then(message_from) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => {
            let messages: Vec<String> = items.iter().filter_map(message_from).collect();
            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(verb: Verb, code: u16, data: Value) -> ControllerResponse {
        ControllerResponse::new(verb, "/p", code, "reason", data)
    }

    #[test]
    fn test_get_found() {
        let result = ResponseHandler::evaluate(&response(Verb::Get, 200, json!([])));
        assert!(result.success);
        assert!(result.found);
        assert!(!result.changed);
    }

    #[test]
    fn test_get_not_found_is_success() {
        let result = ResponseHandler::evaluate(&response(Verb::Get, 404, Value::Null));
        assert!(result.success);
        assert!(!result.found);
    }

    #[test]
    fn test_get_server_error() {
        let result = ResponseHandler::evaluate(&response(Verb::Get, 500, Value::Null));
        assert!(!result.success);
    }

    #[test]
    fn test_write_success() {
        let result = ResponseHandler::evaluate(&response(Verb::Post, 200, json!({"ok": 1})));
        assert!(result.success);
        assert!(result.changed);
    }

    #[test]
    fn test_write_with_error_body() {
        let result = ResponseHandler::evaluate(&response(
            Verb::Delete,
            200,
            json!({"ERROR": "in use"}),
        ));
        assert!(!result.success);
        assert!(!result.changed);
    }

    #[test]
    fn test_error_message_shapes() {
        let cases = [
            (json!({"message": "bad vlan"}), "bad vlan"),
            (json!({"error": {"message": "denied"}}), "denied"),
            (json!({"DATA": {"message": "nested"}}), "nested"),
            (json!([{"message": "one"}, {"message": "two"}]), "one; two"),
            (json!("plain"), "plain"),
            (json!({"raw": "Invalid JSON"}), "Invalid JSON"),
        ];
        for (data, expected) in cases {
            let r = response(Verb::Post, 400, data);
            assert_eq!(ResponseHandler::error_message(&r), expected);
        }
    }

    #[test]
    fn test_error_message_fallback() {
        let r = response(Verb::Post, 500, Value::Null);
        assert_eq!(ResponseHandler::error_message(&r), "reason");

        let r = response(Verb::Post, 500, json!({"code": 7}));
        assert_eq!(ResponseHandler::error_message(&r), r#"reason {"code":7}"#);
    }
}
