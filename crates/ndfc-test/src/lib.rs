//! Test infrastructure for the NDFC REST client
//!
//! Provides:
//! - [`MockController`]: an in-memory [`ndfc_common::Sender`] with
//!   scripted replies per verb and path
//! - Fixtures for common controller replies
//! - Request verification helpers

pub mod fixtures;
mod mock;
mod verification;

pub use fixtures::*;
pub use mock::MockController;
pub use verification::*;
