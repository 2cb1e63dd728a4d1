//! Retrying request orchestration on top of a [`Sender`].
//!
//! `RestSend` sends a request, evaluates the answer with
//! [`ResponseHandler`], and retries transient failures every
//! `send_interval` until `timeout` has been spent. Client errors (4xx)
//! are not retried. In check mode, writes are not sent at all.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::error::{NdfcError, NdfcResult};
use crate::response::{ResponseHandler, ResponseResult};
use crate::results::Results;
use crate::sender::{ControllerResponse, Request, Sender, Verb};

/// Default retry timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default interval between retries.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_secs(5);

/// Sends requests with retries.
#[derive(Clone)]
pub struct RestSend {
    sender: Arc<dyn Sender>,
    timeout: Duration,
    send_interval: Duration,
    check_mode: bool,
    unit_test: bool,
}

impl std::fmt::Debug for RestSend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestSend")
            .field("timeout", &self.timeout)
            .field("send_interval", &self.send_interval)
            .field("check_mode", &self.check_mode)
            .field("unit_test", &self.unit_test)
            .finish()
    }
}

impl RestSend {
    /// Creates a RestSend with default timeout and interval.
    pub fn new(sender: Arc<dyn Sender>) -> Self {
        Self {
            sender,
            timeout: DEFAULT_TIMEOUT,
            send_interval: DEFAULT_SEND_INTERVAL,
            check_mode: false,
            unit_test: false,
        }
    }

    /// Creates a RestSend using the timeout and interval from `config`.
    pub fn from_config(sender: Arc<dyn Sender>, config: &ControllerConfig) -> Self {
        Self::new(sender)
            .with_timeout(config.timeout())
            .with_send_interval(config.send_interval())
    }

    /// Sets the total retry budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the wait between retries.
    pub fn with_send_interval(mut self, send_interval: Duration) -> Self {
        self.send_interval = send_interval;
        self
    }

    /// Enables check mode: writes are reported but not sent.
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Skips the sleep between retries and counts the interval instead of
    /// wall-clock time against the timeout.
    pub fn with_unit_test(mut self, unit_test: bool) -> Self {
        self.unit_test = unit_test;
        self
    }

    /// Returns true if check mode is enabled.
    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    /// Returns the retry timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the retry interval.
    pub fn send_interval(&self) -> Duration {
        self.send_interval
    }

    /// Sends a GET.
    pub async fn get(&self, path: &str) -> NdfcResult<ControllerResponse> {
        self.commit(Verb::Get, path, None).await
    }

    /// Sends a request, retrying transient failures.
    ///
    /// Returns the first successful response. A GET answered with 404 is
    /// successful; callers check [`ControllerResponse::is_not_found`].
    pub async fn commit(
        &self,
        verb: Verb,
        path: &str,
        payload: Option<Value>,
    ) -> NdfcResult<ControllerResponse> {
        self.send_with_retries(verb, path, payload, None).await
    }

    /// Sends a request and registers the outcome in `results`.
    pub async fn commit_with_results(
        &self,
        results: &mut Results,
        action: &str,
        verb: Verb,
        path: &str,
        payload: Option<Value>,
    ) -> NdfcResult<ControllerResponse> {
        let diff = payload.clone();
        self.commit_with_diff(results, action, diff, verb, path, payload)
            .await
    }

    /// Like [`commit_with_results`](Self::commit_with_results), but records
    /// `diff` instead of the request body. Used when the body is absent or
    /// does not describe the change, as for deletes by path.
    ///
    /// Every retried attempt is registered before the final outcome.
    pub async fn commit_with_diff(
        &self,
        results: &mut Results,
        action: &str,
        diff: Option<Value>,
        verb: Verb,
        path: &str,
        payload: Option<Value>,
    ) -> NdfcResult<ControllerResponse> {
        let attempts = Attempts {
            results: &mut *results,
            action,
            diff: &diff,
        };
        match self.send_with_retries(verb, path, payload, Some(attempts)).await {
            Ok(response) => {
                results.register(action, diff, &response, ResponseHandler::evaluate(&response));
                Ok(response)
            }
            Err(e) => {
                results.register_failure(action, diff, &e);
                Err(e)
            }
        }
    }

    async fn send_with_retries(
        &self,
        verb: Verb,
        path: &str,
        payload: Option<Value>,
        mut attempts: Option<Attempts<'_>>,
    ) -> NdfcResult<ControllerResponse> {
        if self.check_mode && verb != Verb::Get {
            info!(%verb, path, "Check mode, not sending request");
            return Ok(ControllerResponse::new(
                verb,
                path,
                200,
                "OK (check mode)",
                payload.unwrap_or(Value::Null),
            ));
        }

        let mut request = Request::new(verb, path);
        if let Some(payload) = payload {
            request = request.with_payload(payload);
        }

        let start = Instant::now();
        let mut waited = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(%verb, path, attempt, "Sending request");

            let (failure, response) = match self.sender.send(&request).await {
                Ok(response) => {
                    let result = ResponseHandler::evaluate(&response);
                    if result.success {
                        return Ok(response);
                    }
                    let failure = NdfcError::Controller {
                        verb,
                        path: path.to_string(),
                        return_code: response.return_code,
                        message: ResponseHandler::error_message(&response),
                    };
                    (failure, Some((response, result)))
                }
                Err(e) => (e, None),
            };

            if !failure.is_retryable() {
                error!(%verb, path, error = %failure, "Request failed");
                return Err(failure);
            }

            let spent = if self.unit_test {
                waited
            } else {
                start.elapsed()
            };
            if spent + self.send_interval > self.timeout {
                error!(%verb, path, attempt, error = %failure, "Giving up on request");
                return Err(NdfcError::Timeout {
                    verb,
                    path: path.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }

            if let Some(attempts) = attempts.as_mut() {
                attempts.record(response, &failure);
            }
            warn!(%verb, path, attempt, error = %failure, "Request failed, retrying");
            if !self.unit_test {
                tokio::time::sleep(self.send_interval).await;
            }
            waited += self.send_interval;
        }
    }
}

/// Where retried attempts of one request are registered.
struct Attempts<'a> {
    results: &'a mut Results,
    action: &'a str,
    diff: &'a Option<Value>,
}

impl Attempts<'_> {
    fn record(
        &mut self,
        response: Option<(ControllerResponse, ResponseResult)>,
        failure: &NdfcError,
    ) {
        match response {
            Some((response, result)) => {
                self.results
                    .register_retry(self.action, self.diff.clone(), &response, result)
            }
            None => self
                .results
                .register_retry_error(self.action, self.diff.clone(), failure),
        }
    }
}
