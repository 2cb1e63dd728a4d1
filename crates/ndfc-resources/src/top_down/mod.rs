//! Top-down overlay objects: VRFs and networks.
//!
//! Both live in a fabric, are keyed by `fabric/name`, carry their
//! parameters in a template config that the controller stores as a JSON
//! string, and are deleted in bulk per fabric. [`TopDownMgr`] reconciles
//! either kind; the [`vrf`](crate::vrf) and [`network`](crate::network)
//! modules supply the types.

mod mgr;
mod object;

pub use mgr::TopDownMgr;
pub use object::{fill_defaults, object_key, retain_keys, TopDownConfig, TopDownObject};
