//! Common infrastructure for the NDFC REST client.
//!
//! This crate provides the pieces shared by every resource manager in
//! `ndfc-resources`:
//!
//! - [`sender`]: Login, token refresh and verb/path/payload dispatch
//! - [`rest_send`]: Retries bounded by a timeout, check mode, response evaluation
//! - [`response`]: Interpretation of controller return codes and error bodies
//! - [`results`]: Per-task result accumulation for the final report
//! - [`reconcile`]: The want/have/need engine and the [`Reconciler`] trait
//! - [`validations`]: Field-level syntactic checks for user configuration
//! - [`endpoints`]: REST paths for every controller call
//! - [`config`]: Controller credentials and config-file loading
//! - [`error`]: Error types
//!
//! # Architecture
//!
//! Resource managers follow this pattern:
//!
//! 1. Build `want` from validated user configuration
//! 2. Fetch `have` from the controller with a GET
//! 3. Diff into `need` (create / update / replace / delete)
//! 4. Issue the REST calls for `need` through [`RestSend`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ndfc_common::{endpoints, ControllerConfig, HttpSender, RestSend};
//!
//! async fn list_fabrics(config: ControllerConfig) -> ndfc_common::NdfcResult<()> {
//!     let sender = Arc::new(HttpSender::new(config.clone())?);
//!     let rest_send = RestSend::from_config(sender, &config);
//!     let response = rest_send.get(&endpoints::fabrics::list().path).await?;
//!     println!("{}", response.data);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod endpoints;
pub mod error;
pub mod reconcile;
pub mod response;
pub mod rest_send;
pub mod results;
pub mod sender;
pub mod validations;

// Re-export commonly used items at crate root
pub use config::{load_config_file, ControllerConfig, Scheme};
pub use endpoints::Endpoint;
pub use error::{NdfcError, NdfcResult};
pub use reconcile::{compute_need, index_by_key, merge_json, Keyed, Need, Reconciler, State};
pub use response::{ResponseHandler, ResponseResult};
pub use rest_send::RestSend;
pub use results::Results;
pub use sender::{ControllerResponse, HistoryEntry, HttpSender, Request, Sender, Verb};
