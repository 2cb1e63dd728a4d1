//! Resource managers for the NDFC REST API.
//!
//! Each module reconciles one kind of controller object with the
//! want/have/need engine from [`ndfc_common::reconcile`]:
//!
//! - [`fabric`]: Fabrics and their template parameters
//! - [`vrf`], [`network`]: Overlay VRFs and networks
//! - [`attach`]: Switch attachments of VRFs and networks
//! - [`policy`]: Switch policies
//! - [`image_policy`]: Image policies
//! - [`bootflash`]: Bootflash file listing and deletion
//! - [`maintenance_mode`]: Switch maintenance mode
//! - [`discovery`]: Switch discovery
//! - [`inventory`]: Fabric switch inventory and IP to serial resolution
//!
//! Every manager implements [`ndfc_common::Reconciler`]; build one with a
//! [`ndfc_common::RestSend`], a [`ndfc_common::State`] and its typed
//! configuration, then call `reconcile()`.

pub mod attach;
pub mod bootflash;
pub mod discovery;
pub mod fabric;
pub mod image_policy;
pub mod inventory;
pub mod maintenance_mode;
pub mod network;
pub mod policy;
pub mod top_down;
pub mod vrf;
pub mod wire;

pub use attach::{AttachConfig, AttachKind, AttachMgr};
pub use bootflash::{BootflashConfig, BootflashInfo, BootflashMgr};
pub use discovery::{DiscoverConfig, DiscoveryMgr};
pub use fabric::{FabricConfig, FabricMgr};
pub use image_policy::{ImagePolicyConfig, ImagePolicyMgr};
pub use inventory::{Inventory, InventoryCache, SwitchInfo};
pub use maintenance_mode::{MaintenanceModeConfig, MaintenanceModeMgr};
pub use network::{NetworkConfig, NetworkMgr};
pub use policy::{PolicyConfig, PolicyMgr};
pub use vrf::{VrfConfig, VrfMgr};
