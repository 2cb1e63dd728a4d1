//! Fabric management.
//!
//! A fabric is created from a template (Easy_Fabric, External_Fabric,
//! LAN_Classic or MSD_Fabric) and carries its parameters as a flat map of
//! nvPairs. Only the nvPairs the user sets are compared against the
//! controller; the rest are left to the template defaults.

mod mgr;
mod types;

pub use mgr::FabricMgr;
pub use types::{
    FabricConfig, FabricPayload, FabricTemplate, ReplicationMode, DEFAULT_ANYCAST_GW_MAC,
};
