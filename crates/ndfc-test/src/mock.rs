//! In-memory controller used by unit and integration tests.

use async_trait::async_trait;
use ndfc_common::{ControllerResponse, Endpoint, NdfcResult, Request, Sender, Verb};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

type Route = (Verb, String);

/// Scripted controller.
///
/// Each `(verb, path)` route holds a queue of replies. Replies are popped
/// in order; the last one stays and answers every later request. Routes
/// with no reply answer 404.
#[derive(Debug, Default)]
pub struct MockController {
    routes: Mutex<HashMap<Route, VecDeque<ControllerResponse>>>,
    requests: Mutex<Vec<Request>>,
}

impl MockController {
    /// Creates a controller with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for `verb` and `path`.
    pub fn on(&self, verb: Verb, path: impl Into<String>, return_code: u16, data: Value) -> &Self {
        let path = path.into();
        let message = if (200..300).contains(&return_code) {
            "OK"
        } else {
            "Error"
        };
        let response = ControllerResponse::new(verb, path.clone(), return_code, message, data);
        self.routes
            .lock()
            .entry((verb, path))
            .or_default()
            .push_back(response);
        self
    }

    /// Queues a reply for an endpoint.
    pub fn on_endpoint(&self, endpoint: &Endpoint, return_code: u16, data: Value) -> &Self {
        self.on(endpoint.verb, endpoint.path.clone(), return_code, data)
    }

    /// Queues a 200 reply for an endpoint.
    pub fn ok(&self, endpoint: &Endpoint, data: Value) -> &Self {
        self.on_endpoint(endpoint, 200, data)
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Requests received for `verb` and `path`.
    pub fn requests_for(&self, verb: Verb, path: &str) -> Vec<Request> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.verb == verb && r.path == path)
            .cloned()
            .collect()
    }

    /// Payloads of the requests received for an endpoint.
    pub fn payloads_for(&self, endpoint: &Endpoint) -> Vec<Value> {
        self.requests_for(endpoint.verb, &endpoint.path)
            .into_iter()
            .filter_map(|r| r.payload)
            .collect()
    }

    /// Number of requests received with a write verb.
    pub fn write_count(&self) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.verb != Verb::Get)
            .count()
    }

    /// Forgets every recorded request. Routes are kept.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl Sender for MockController {
    async fn send(&self, request: &Request) -> NdfcResult<ControllerResponse> {
        self.requests.lock().push(request.clone());

        let mut routes = self.routes.lock();
        let route = (request.verb, request.path.clone());
        let response = match routes.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        let response = response.unwrap_or_else(|| {
            ControllerResponse::new(
                request.verb,
                request.path.clone(),
                404,
                "Not Found",
                json!({"message": format!("no route for {} {}", request.verb, request.path)}),
            )
        });
        debug!(verb = %request.verb, path = %request.path, code = response.return_code, "Mock reply");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_then_sticky() {
        let mock = MockController::new();
        mock.on(Verb::Get, "/a", 500, json!({}))
            .on(Verb::Get, "/a", 200, json!({"n": 1}));

        let request = Request::new(Verb::Get, "/a");
        assert_eq!(mock.send(&request).await.unwrap().return_code, 500);
        assert_eq!(mock.send(&request).await.unwrap().return_code, 200);
        assert_eq!(mock.send(&request).await.unwrap().return_code, 200);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let mock = MockController::new();
        let response = mock.send(&Request::new(Verb::Delete, "/nope")).await.unwrap();
        assert_eq!(response.return_code, 404);
        assert_eq!(mock.write_count(), 1);
    }

    #[tokio::test]
    async fn test_payloads_recorded() {
        let mock = MockController::new();
        let endpoint = ndfc_common::endpoints::policies::create();
        mock.ok(&endpoint, json!({}));
        let request =
            Request::new(endpoint.verb, endpoint.path.clone()).with_payload(json!({"a": 1}));
        mock.send(&request).await.unwrap();
        assert_eq!(mock.payloads_for(&endpoint), vec![json!({"a": 1})]);
    }
}
