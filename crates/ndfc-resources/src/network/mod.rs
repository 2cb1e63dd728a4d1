//! Network management.
//!
//! Networks are reconciled by [`TopDownMgr`](crate::top_down::TopDownMgr);
//! switch and port attachments by [`AttachMgr`](crate::attach::AttachMgr)
//! with [`AttachKind::Network`](crate::attach::AttachKind::Network).

mod types;

pub use types::{
    NetworkConfig, NetworkPayload, DEFAULT_NETWORK_EXTENSION_TEMPLATE, DEFAULT_NETWORK_TEMPLATE,
    LAYER2_VRF, TEMPLATE_KEYS,
};

/// Reconciles networks.
pub type NetworkMgr = crate::top_down::TopDownMgr<NetworkConfig>;
