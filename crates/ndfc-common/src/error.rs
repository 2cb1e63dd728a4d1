//! Error types for NDFC client operations.
//!
//! This module defines the error types used throughout the ndfc crates.
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use thiserror::Error;

use crate::sender::Verb;

/// Result type alias for NDFC client operations.
pub type NdfcResult<T> = Result<T, NdfcError>;

/// Errors that can occur while talking to the controller.
#[derive(Debug, Error)]
pub enum NdfcError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP request failed: {verb} {path}: {source}")]
    Http {
        /// The request verb.
        verb: Verb,
        /// The request path.
        path: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Login was rejected or returned no token.
    #[error("Login failed: {message}")]
    Login {
        /// Error message.
        message: String,
    },

    /// The controller answered with a failure return code.
    #[error("Controller returned {return_code} for {verb} {path}: {message}")]
    Controller {
        /// The request verb.
        verb: Verb,
        /// The request path.
        path: String,
        /// HTTP return code.
        return_code: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// The controller answered with a body we cannot interpret.
    #[error("Invalid response from {path}: {message}")]
    InvalidResponse {
        /// The request path.
        path: String,
        /// Error message.
        message: String,
    },

    /// Retries were exhausted before the request succeeded.
    #[error("Timed out after {timeout_secs}s: {verb} {path}")]
    Timeout {
        /// The request verb.
        verb: Verb,
        /// The request path.
        path: String,
        /// The configured timeout.
        timeout_secs: u64,
    },

    /// User configuration failed validation.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// A named object does not exist on the controller.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Object kind (e.g., "fabric", "switch").
        kind: String,
        /// Object name or key.
        name: String,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl NdfcError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates an invalid response error.
    pub fn invalid_response(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a login error.
    pub fn login(message: impl Into<String>) -> Self {
        Self::Login {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            NdfcError::Http { .. } => true,
            NdfcError::Controller { return_code, .. } => *return_code >= 500,
            _ => false,
        }
    }
}
