//! Image policies.
//!
//! An image policy names the NX-OS release, packages and EPLD image a
//! group of switches should run. Policies are global, keyed by name.

mod mgr;
mod types;

pub use mgr::ImagePolicyMgr;
pub use types::{ImagePolicy, ImagePolicyConfig, Packages, Platform};
