//! Switch attachments of VRFs and networks.
//!
//! An attachment binds one VRF or network to one switch, with a VLAN and,
//! for networks, a set of access or trunk ports. The controller reports
//! attachments per object as a `lanAttachList` and accepts changes in the
//! same shape, with `deployment: false` meaning detach.

mod mgr;
mod types;

pub use mgr::AttachMgr;
pub use types::{
    attachment_key, normalize_ports, AttachConfig, AttachKind, Attachment, SwitchAttach,
};
