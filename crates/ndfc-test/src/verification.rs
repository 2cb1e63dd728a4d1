//! Verification helpers for asserting what reached the mock controller

use crate::MockController;
use ndfc_common::{Endpoint, Verb};
use serde_json::Value;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected {verb} {path} to be sent, but it was not")]
    NotSent { verb: Verb, path: String },

    #[error("Expected {verb} {path} not to be sent, but it was sent {count} time(s)")]
    Unexpected {
        verb: Verb,
        path: String,
        count: usize,
    },

    #[error("Expected {expected} request(s) to {verb} {path}, found {actual}")]
    CountMismatch {
        verb: Verb,
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected no writes, found {count}: {summary}")]
    UnexpectedWrites { count: usize, summary: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Request verification helper
pub struct RequestVerifier<'a> {
    mock: &'a MockController,
}

impl<'a> RequestVerifier<'a> {
    /// Create a verifier over a mock controller
    pub fn new(mock: &'a MockController) -> Self {
        Self { mock }
    }

    /// Verify an endpoint was called at least once; returns its payloads
    pub fn sent(&self, endpoint: &Endpoint) -> VerifyResult<Vec<Value>> {
        let requests = self.mock.requests_for(endpoint.verb, &endpoint.path);
        if requests.is_empty() {
            return Err(VerificationError::NotSent {
                verb: endpoint.verb,
                path: endpoint.path.clone(),
            });
        }
        Ok(requests.into_iter().filter_map(|r| r.payload).collect())
    }

    /// Verify an endpoint was never called
    pub fn not_sent(&self, endpoint: &Endpoint) -> VerifyResult<()> {
        let count = self.mock.requests_for(endpoint.verb, &endpoint.path).len();
        if count > 0 {
            return Err(VerificationError::Unexpected {
                verb: endpoint.verb,
                path: endpoint.path.clone(),
                count,
            });
        }
        Ok(())
    }

    /// Verify an endpoint was called exactly `expected` times
    pub fn sent_times(&self, endpoint: &Endpoint, expected: usize) -> VerifyResult<()> {
        let actual = self.mock.requests_for(endpoint.verb, &endpoint.path).len();
        if actual != expected {
            return Err(VerificationError::CountMismatch {
                verb: endpoint.verb,
                path: endpoint.path.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify only GETs were sent
    pub fn no_writes(&self) -> VerifyResult<()> {
        let writes: Vec<String> = self
            .mock
            .requests()
            .into_iter()
            .filter(|r| r.verb != Verb::Get)
            .map(|r| format!("{} {}", r.verb, r.path))
            .collect();
        if writes.is_empty() {
            Ok(())
        } else {
            Err(VerificationError::UnexpectedWrites {
                count: writes.len(),
                summary: writes.join(", "),
            })
        }
    }
}
