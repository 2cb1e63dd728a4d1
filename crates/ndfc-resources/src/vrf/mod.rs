//! VRF management.
//!
//! VRFs are reconciled by [`TopDownMgr`](crate::top_down::TopDownMgr);
//! switch attachments by [`AttachMgr`](crate::attach::AttachMgr) with
//! [`AttachKind::Vrf`](crate::attach::AttachKind::Vrf).

mod types;

pub use types::{
    VrfConfig, VrfPayload, DEFAULT_VRF_EXTENSION_TEMPLATE, DEFAULT_VRF_TEMPLATE, TEMPLATE_KEYS,
};

/// Reconciles VRFs.
pub type VrfMgr = crate::top_down::TopDownMgr<VrfConfig>;
