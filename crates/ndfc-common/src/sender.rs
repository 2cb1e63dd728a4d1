//! Request dispatch against the controller.
//!
//! [`Sender`] is the seam between the reconciliation code and the wire.
//! [`HttpSender`] is the production implementation: it logs in, attaches
//! the bearer token to every request, logs in again once when the
//! controller rejects the token, and keeps a bounded history of the
//! return codes and paths it has seen.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::ControllerConfig;
use crate::error::{NdfcError, NdfcResult};

/// Path of the Nexus Dashboard login endpoint.
pub const LOGIN_PATH: &str = "/login";

/// HTTP verbs used by the controller API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    /// Returns the verb as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    fn method(&self) -> reqwest::Method {
        match self {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Put => reqwest::Method::PUT,
            Verb::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP verb
    pub verb: Verb,
    /// Path below the controller base URL, including any query string
    pub path: String,
    /// JSON body, if any
    pub payload: Option<Value>,
}

impl Request {
    /// Creates a request without a body.
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            payload: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// The controller's answer to a request, in the shape the rest of the
/// library consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ControllerResponse {
    /// HTTP status code
    pub return_code: u16,
    /// Verb of the request that produced this response
    pub method: Verb,
    /// Path of the request that produced this response
    pub request_path: String,
    /// HTTP reason phrase
    pub message: String,
    /// Parsed body
    pub data: Value,
}

impl ControllerResponse {
    /// Creates a response.
    pub fn new(
        method: Verb,
        request_path: impl Into<String>,
        return_code: u16,
        message: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            return_code,
            method,
            request_path: request_path.into(),
            message: message.into(),
            data,
        }
    }

    /// Returns true for a 2xx return code.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.return_code)
    }

    /// Returns true when a GET reported the object as absent.
    pub fn is_not_found(&self) -> bool {
        self.return_code == 404
    }
}

/// Parses a response body.
///
/// Empty bodies become `null`; bodies that are not JSON are wrapped as
/// `{"raw": <text>}`.
pub fn parse_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| json!({ "raw": trimmed }))
}

/// One entry of the sender history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// HTTP status code
    pub return_code: u16,
    /// Request verb
    pub verb: Verb,
    /// Request path
    pub path: String,
}

/// Bounded, most-recent-first history of requests.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    /// Creates an empty history holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a request, dropping the oldest entry when full.
    pub fn record(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Returns the number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a copy of the entries, most recent first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Returns the recorded return codes, most recent first.
    pub fn return_codes(&self) -> Vec<u16> {
        self.entries.iter().map(|e| e.return_code).collect()
    }

    /// Returns the recorded paths, most recent first.
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }
}

/// Sends requests to a controller.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Sends one request and returns the controller's response.
    ///
    /// Implementations return `Ok` for any HTTP answer, including error
    /// return codes; `Err` is reserved for failures to obtain an answer.
    async fn send(&self, request: &Request) -> NdfcResult<ControllerResponse>;
}

/// Sender backed by `reqwest`.
pub struct HttpSender {
    client: reqwest::Client,
    config: ControllerConfig,
    token: RwLock<Option<String>>,
    history: Mutex<History>,
}

impl fmt::Debug for HttpSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSender")
            .field("config", &self.config)
            .field("history_len", &self.history.lock().len())
            .finish()
    }
}

impl HttpSender {
    /// Creates a sender. No request is made until the first `send()` or
    /// an explicit `login()`.
    pub fn new(config: ControllerConfig) -> NdfcResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout())
            .build()
            .map_err(|e| NdfcError::internal(format!("failed to build HTTP client: {}", e)))?;

        let history = Mutex::new(History::new(config.history_size));

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
            history,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    fn record(&self, return_code: u16, verb: Verb, path: &str) {
        self.history.lock().record(HistoryEntry {
            return_code,
            verb,
            path: path.to_string(),
        });
    }

    /// Logs in and stores the session token.
    #[instrument(skip(self), fields(ip = %self.config.ip, user = %self.config.username))]
    pub async fn login(&self) -> NdfcResult<()> {
        let body = json!({
            "userName": self.config.username,
            "userPasswd": self.config.password,
            "domain": self.config.domain,
        });

        let http_err = |source| NdfcError::Http {
            verb: Verb::Post,
            path: LOGIN_PATH.to_string(),
            source,
        };

        let response = self
            .client
            .post(self.url(LOGIN_PATH))
            .json(&body)
            .send()
            .await
            .map_err(http_err)?;
        let status = response.status();
        let text = response.text().await.map_err(http_err)?;
        self.record(status.as_u16(), Verb::Post, LOGIN_PATH);

        if !status.is_success() {
            return Err(NdfcError::login(format!(
                "controller returned {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let data = parse_body(&text);
        let token = data
            .get("jwttoken")
            .or_else(|| data.get("token"))
            .and_then(Value::as_str)
            .ok_or_else(|| NdfcError::login("response did not contain a token"))?;

        *self.token.write().await = Some(token.to_string());
        info!("Logged in to controller");
        Ok(())
    }

    /// Returns a snapshot of the request history, most recent first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.lock().snapshot()
    }

    async fn dispatch(&self, request: &Request) -> NdfcResult<ControllerResponse> {
        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or_else(|| NdfcError::login("not logged in"))?;

        let http_err = |source| NdfcError::Http {
            verb: request.verb,
            path: request.path.clone(),
            source,
        };

        let mut builder = self
            .client
            .request(request.verb.method(), self.url(&request.path))
            .bearer_auth(token)
            .header(CONTENT_TYPE, "application/json");
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder.send().await.map_err(http_err)?;
        let status = response.status();
        let text = response.text().await.map_err(http_err)?;
        self.record(status.as_u16(), request.verb, &request.path);

        debug!(return_code = status.as_u16(), "Received response");

        Ok(ControllerResponse::new(
            request.verb,
            request.path.clone(),
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            parse_body(&text),
        ))
    }
}

#[async_trait]
impl Sender for HttpSender {
    #[instrument(skip(self, request), fields(verb = %request.verb, path = %request.path))]
    async fn send(&self, request: &Request) -> NdfcResult<ControllerResponse> {
        if self.token.read().await.is_none() {
            self.login().await?;
        }

        let response = self.dispatch(request).await?;
        if response.return_code == 401 {
            debug!("Token rejected, logging in again");
            self.login().await?;
            return self.dispatch(request).await;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: u16, path: &str) -> HistoryEntry {
        HistoryEntry {
            return_code: code,
            verb: Verb::Get,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_verb_display() {
        assert_eq!(Verb::Get.to_string(), "GET");
        assert_eq!(Verb::Delete.as_str(), "DELETE");
        assert_eq!(serde_json::to_value(Verb::Put).unwrap(), json!("PUT"));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("  \n"), Value::Null);
        assert_eq!(parse_body(r#"{"a": 1}"#), json!({"a": 1}));
        assert_eq!(parse_body("Fabric deleted"), json!({"raw": "Fabric deleted"}));
    }

    #[test]
    fn test_history_bounded_most_recent_first() {
        let mut history = History::new(3);
        for (i, code) in [200, 201, 404, 500].into_iter().enumerate() {
            history.record(entry(code, &format!("/p{}", i)));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.return_codes(), vec![500, 404, 201]);
        assert_eq!(history.paths(), vec!["/p3", "/p2", "/p1"]);
    }

    #[test]
    fn test_history_zero_capacity() {
        let mut history = History::new(0);
        history.record(entry(200, "/p"));
        assert!(history.is_empty());
    }

    #[test]
    fn test_response_serializes_upper_case() {
        let response = ControllerResponse::new(Verb::Get, "/p", 200, "OK", json!([]));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["RETURN_CODE"], 200);
        assert_eq!(value["METHOD"], "GET");
        assert_eq!(value["REQUEST_PATH"], "/p");
        assert_eq!(value["MESSAGE"], "OK");
        assert!(response.is_success());
        assert!(!response.is_not_found());
    }

    #[test]
    fn test_http_sender_starts_with_empty_history() {
        let config = ControllerConfig {
            ip: "127.0.0.1".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            history_size: 5,
            ..Default::default()
        };
        let sender = HttpSender::new(config).unwrap();
        assert!(sender.history().is_empty());
        assert_eq!(sender.url("/login"), "https://127.0.0.1/login");
    }

    mod http {
        use super::*;
        use crate::config::Scheme;
        use crate::rest_send::RestSend;
        use httptest::matchers::{all_of, contains, eq, json_decoded, request};
        use httptest::responders::{json_encoded, status_code};
        use httptest::{cycle, Expectation, Server};
        use std::sync::Arc;
        use std::time::Duration;

        fn sender(server: &Server) -> HttpSender {
            let config = ControllerConfig {
                ip: server.addr().to_string(),
                username: "admin".to_string(),
                password: "pw".to_string(),
                scheme: Scheme::Http,
                ..Default::default()
            };
            HttpSender::new(config).unwrap()
        }

        fn expect_login(server: &Server, token: Value) {
            server.expect(
                Expectation::matching(all_of![
                    request::method_path("POST", "/login"),
                    request::body(json_decoded(eq(json!({
                        "userName": "admin",
                        "userPasswd": "pw",
                        "domain": "local",
                    })))),
                ])
                .times(1)
                .respond_with(json_encoded(token)),
            );
        }

        #[tokio::test]
        async fn test_login_token_is_reused() {
            let server = Server::run();
            expect_login(&server, json!({"jwttoken": "t1"}));
            server.expect(
                Expectation::matching(all_of![
                    request::method_path("GET", "/p"),
                    request::headers(contains(("authorization", "Bearer t1"))),
                ])
                .times(2)
                .respond_with(json_encoded(json!({"ok": true}))),
            );

            let sender = sender(&server);
            for _ in 0..2 {
                let response = sender.send(&Request::new(Verb::Get, "/p")).await.unwrap();
                assert_eq!(response.return_code, 200);
                assert_eq!(response.data, json!({"ok": true}));
            }
            assert_eq!(sender.history().len(), 3);
        }

        #[tokio::test]
        async fn test_login_falls_back_to_token_field() {
            let server = Server::run();
            expect_login(&server, json!({"token": "t2"}));

            let sender = sender(&server);
            sender.login().await.unwrap();
            assert_eq!(sender.token.read().await.as_deref(), Some("t2"));
        }

        #[tokio::test]
        async fn test_login_without_token_fails() {
            let server = Server::run();
            expect_login(&server, json!({"status": "ok"}));

            let err = sender(&server).login().await.unwrap_err();
            assert!(matches!(err, NdfcError::Login { .. }));
        }

        #[tokio::test]
        async fn test_unauthorized_logs_in_again() {
            let server = Server::run();
            server.expect(
                Expectation::matching(request::method_path("POST", "/login"))
                    .times(2)
                    .respond_with(cycle![
                        json_encoded(json!({"jwttoken": "old"})),
                        json_encoded(json!({"jwttoken": "new"})),
                    ]),
            );
            server.expect(
                Expectation::matching(all_of![
                    request::method_path("GET", "/p"),
                    request::headers(contains(("authorization", "Bearer old"))),
                ])
                .times(1)
                .respond_with(status_code(401)),
            );
            server.expect(
                Expectation::matching(all_of![
                    request::method_path("GET", "/p"),
                    request::headers(contains(("authorization", "Bearer new"))),
                ])
                .times(1)
                .respond_with(json_encoded(json!([]))),
            );

            let sender = sender(&server);
            let response = sender.send(&Request::new(Verb::Get, "/p")).await.unwrap();
            assert_eq!(response.return_code, 200);
            assert_eq!(sender.history()[0].return_code, 200);
            assert_eq!(sender.history()[2].return_code, 401);
        }

        #[tokio::test]
        async fn test_second_unauthorized_is_an_error() {
            let server = Server::run();
            server.expect(
                Expectation::matching(request::method_path("POST", "/login"))
                    .times(2)
                    .respond_with(json_encoded(json!({"jwttoken": "t1"}))),
            );
            server.expect(
                Expectation::matching(request::method_path("GET", "/p"))
                    .times(2)
                    .respond_with(status_code(401)),
            );

            let rest_send = RestSend::new(Arc::new(sender(&server)))
                .with_timeout(Duration::from_secs(10))
                .with_unit_test(true);
            let err = rest_send.get("/p").await.unwrap_err();
            assert!(matches!(err, NdfcError::Controller { return_code: 401, .. }));
        }
    }
}
