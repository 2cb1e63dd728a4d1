//! Accumulated results of a reconciliation run.
//!
//! Every task (one REST call, or one skipped/queried object) appends an
//! entry to three parallel lists: `diff` (what we asked for), `response`
//! (what the controller said) and `result` (how we evaluated it).

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::NdfcError;
use crate::reconcile::State;
use crate::response::ResponseResult;
use crate::sender::ControllerResponse;

/// Results of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Results {
    state: State,
    check_mode: bool,
    diff: Vec<Value>,
    response: Vec<Value>,
    result: Vec<Value>,
}

impl Results {
    /// Creates an empty result set.
    pub fn new(state: State, check_mode: bool) -> Self {
        Self {
            state,
            check_mode,
            diff: Vec::new(),
            response: Vec::new(),
            result: Vec::new(),
        }
    }

    /// Returns the state this run reconciled towards.
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns true if this run did not contact the controller for writes.
    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    fn next_sequence(&self) -> usize {
        self.result.len() + 1
    }

    fn push(&mut self, action: &str, diff: Value, response: Value, result: Value) {
        let sequence_number = self.next_sequence();
        let tag = |mut value: Value| {
            if let Value::Object(map) = &mut value {
                map.insert("sequence_number".to_string(), json!(sequence_number));
            }
            value
        };
        self.diff.push(tag(json!({ "action": action, "payload": diff })));
        self.response.push(tag(response));
        self.result.push(tag(result));
    }

    /// Registers a request that reached the controller.
    pub fn register(
        &mut self,
        action: &str,
        diff: Option<Value>,
        response: &ControllerResponse,
        result: ResponseResult,
    ) {
        let response_value = serde_json::to_value(response).unwrap_or(Value::Null);
        let result_value = json!({
            "success": result.success,
            "found": result.found,
            "changed": result.changed,
        });
        self.push(
            action,
            diff.unwrap_or(Value::Null),
            json!({ "controller": response_value }),
            result_value,
        );
    }

    /// Registers a request that failed.
    pub fn register_failure(&mut self, action: &str, diff: Option<Value>, error: &NdfcError) {
        self.push(
            action,
            diff.unwrap_or(Value::Null),
            json!({ "error": error.to_string() }),
            json!({ "success": false, "found": false, "changed": false }),
        );
    }

    /// Registers an attempt that failed and was retried. Retried attempts
    /// do not count towards [`failed`](Self::failed); the final attempt
    /// decides.
    pub fn register_retry(
        &mut self,
        action: &str,
        diff: Option<Value>,
        response: &ControllerResponse,
        result: ResponseResult,
    ) {
        let response_value = serde_json::to_value(response).unwrap_or(Value::Null);
        self.push(
            action,
            diff.unwrap_or(Value::Null),
            json!({ "controller": response_value }),
            json!({
                "success": result.success,
                "found": result.found,
                "changed": result.changed,
                "retried": true,
            }),
        );
    }

    /// Registers an attempt that did not reach the controller and was retried.
    pub fn register_retry_error(&mut self, action: &str, diff: Option<Value>, error: &NdfcError) {
        self.push(
            action,
            diff.unwrap_or(Value::Null),
            json!({ "error": error.to_string() }),
            json!({ "success": false, "found": false, "changed": false, "retried": true }),
        );
    }

    /// Registers a task that needed no request, such as an object that is
    /// already in the desired state, or a query result.
    pub fn register_unchanged(&mut self, action: &str, diff: Value) {
        self.push(
            action,
            diff,
            json!({}),
            json!({ "success": true, "found": true, "changed": false }),
        );
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.result.len()
    }

    /// Returns true if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    /// Returns true if any task changed controller state.
    pub fn changed(&self) -> bool {
        self.result
            .iter()
            .any(|r| r.get("changed").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Returns true if any task failed.
    pub fn failed(&self) -> bool {
        self.result
            .iter()
            .filter(|r| !r.get("retried").and_then(Value::as_bool).unwrap_or(false))
            .any(|r| !r.get("success").and_then(Value::as_bool).unwrap_or(false))
    }

    /// Returns the registered diffs.
    pub fn diff(&self) -> &[Value] {
        &self.diff
    }

    /// Returns the registered responses.
    pub fn response(&self) -> &[Value] {
        &self.response
    }

    /// Returns the registered results.
    pub fn result(&self) -> &[Value] {
        &self.result
    }

    /// Builds the final report printed by the CLI.
    pub fn final_result(&self) -> Value {
        json!({
            "changed": self.changed(),
            "failed": self.failed(),
            "diff": self.diff,
            "response": self.response,
            "result": self.result,
            "metadata": {
                "state": self.state.as_str(),
                "check_mode": self.check_mode,
            },
        })
    }
}
