//! REST endpoint builders for controller operations.
//!
//! Names inserted into paths have already passed the validators in
//! [`crate::validations`], so they are used verbatim.

use crate::sender::Verb;

/// Joins a path under the API root at compile time.
macro_rules! api_v1 {
    ($suffix:literal) => {
        concat!("/appcenter/cisco/ndfc/api/v1", $suffix)
    };
}

/// Root of the NDFC REST API.
pub const API_V1: &str = api_v1!("");

/// LAN fabric control API.
pub const CONTROL: &str = api_v1!("/lan-fabric/rest/control");

/// LAN fabric top-down (overlay) API.
pub const TOP_DOWN: &str = api_v1!("/lan-fabric/rest/top-down");

/// Image management API.
pub const IMAGE_MANAGEMENT: &str = api_v1!("/imagemanagement/rest");

/// A verb and path pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP verb
    pub verb: Verb,
    /// Request path
    pub path: String,
}

impl Endpoint {
    fn new(verb: Verb, path: String) -> Self {
        Self { verb, path }
    }
}

/// Fabric, inventory and maintenance mode endpoints.
pub mod fabrics {
    use super::*;

    /// List all fabrics
    pub fn list() -> Endpoint {
        Endpoint::new(Verb::Get, format!("{}/fabrics", CONTROL))
    }

    /// Create a fabric from a template
    pub fn create(fabric: &str, template: &str) -> Endpoint {
        Endpoint::new(Verb::Post, format!("{}/fabrics/{}/{}", CONTROL, fabric, template))
    }

    /// Update a fabric's template parameters
    pub fn update(fabric: &str, template: &str) -> Endpoint {
        Endpoint::new(Verb::Put, format!("{}/fabrics/{}/{}", CONTROL, fabric, template))
    }

    /// Delete a fabric
    pub fn delete(fabric: &str) -> Endpoint {
        Endpoint::new(Verb::Delete, format!("{}/fabrics/{}", CONTROL, fabric))
    }

    /// Save (recalculate) a fabric's configuration
    pub fn config_save(fabric: &str) -> Endpoint {
        Endpoint::new(Verb::Post, format!("{}/fabrics/{}/config-save", CONTROL, fabric))
    }

    /// Deploy pending configuration to every switch in a fabric
    pub fn config_deploy(fabric: &str) -> Endpoint {
        Endpoint::new(
            Verb::Post,
            format!("{}/fabrics/{}/config-deploy?forceShowRun=false", CONTROL, fabric),
        )
    }

    /// Deploy pending configuration to the given switches
    pub fn config_deploy_switches(fabric: &str, serials: &[String]) -> Endpoint {
        Endpoint::new(
            Verb::Post,
            format!(
                "{}/fabrics/{}/config-deploy/{}?forceShowRun=false",
                CONTROL,
                fabric,
                serials.join(",")
            ),
        )
    }

    /// List the switches in a fabric
    pub fn switches_by_fabric(fabric: &str) -> Endpoint {
        Endpoint::new(
            Verb::Get,
            format!("{}/fabrics/{}/inventory/switchesByFabric", CONTROL, fabric),
        )
    }

    /// Probe a seed switch for discoverable neighbors
    pub fn test_reachability(fabric: &str) -> Endpoint {
        Endpoint::new(
            Verb::Post,
            format!("{}/fabrics/{}/inventory/test-reachability", CONTROL, fabric),
        )
    }

    /// Add discovered switches to a fabric
    pub fn discover(fabric: &str) -> Endpoint {
        Endpoint::new(
            Verb::Post,
            format!("{}/fabrics/{}/inventory/discover", CONTROL, fabric),
        )
    }

    /// Put a switch into maintenance mode (`enable`) or back to normal mode
    pub fn maintenance_mode(fabric: &str, serial: &str, enable: bool) -> Endpoint {
        let verb = if enable { Verb::Post } else { Verb::Delete };
        Endpoint::new(
            verb,
            format!(
                "{}/fabrics/{}/switches/{}/maintenance-mode",
                CONTROL, fabric, serial
            ),
        )
    }
}

/// Switch policy endpoints.
pub mod policies {
    use super::*;

    /// Create a policy
    pub fn create() -> Endpoint {
        Endpoint::new(Verb::Post, format!("{}/policies", CONTROL))
    }

    /// Update a policy
    pub fn update(policy_id: &str) -> Endpoint {
        Endpoint::new(Verb::Put, format!("{}/policies/{}", CONTROL, policy_id))
    }

    /// List the policies on a switch
    pub fn by_switch(serial: &str) -> Endpoint {
        Endpoint::new(
            Verb::Get,
            format!("{}/policies/switches?serialNumber={}", CONTROL, serial),
        )
    }

    /// Delete policies by ID
    pub fn delete(policy_ids: &[String]) -> Endpoint {
        Endpoint::new(
            Verb::Delete,
            format!("{}/policies/policyIds?policyIds={}", CONTROL, policy_ids.join(",")),
        )
    }
}

/// Builds the endpoint family shared by VRFs and networks.
macro_rules! top_down_endpoints {
    ($module:ident, $collection:literal, $names_param:literal) => {
        #[doc = concat!("Top-down ", $collection, " endpoints.")]
        pub mod $module {
            use super::*;

            #[doc = concat!("List the ", $collection, " in a fabric")]
            pub fn list(fabric: &str) -> Endpoint {
                Endpoint::new(
                    Verb::Get,
                    format!("{}/fabrics/{}/{}", TOP_DOWN, fabric, $collection),
                )
            }

            #[doc = concat!("Create one of the ", $collection)]
            pub fn create(fabric: &str) -> Endpoint {
                Endpoint::new(
                    Verb::Post,
                    format!("{}/fabrics/{}/{}", TOP_DOWN, fabric, $collection),
                )
            }

            #[doc = concat!("Update one of the ", $collection)]
            pub fn update(fabric: &str, name: &str) -> Endpoint {
                Endpoint::new(
                    Verb::Put,
                    format!("{}/fabrics/{}/{}/{}", TOP_DOWN, fabric, $collection, name),
                )
            }

            #[doc = concat!("Delete several ", $collection, " at once")]
            pub fn bulk_delete(fabric: &str, names: &[String]) -> Endpoint {
                Endpoint::new(
                    Verb::Delete,
                    format!(
                        "{}/fabrics/{}/bulk-delete/{}?{}={}",
                        TOP_DOWN,
                        fabric,
                        $collection,
                        $names_param,
                        names.join(",")
                    ),
                )
            }

            /// Query switch attachments
            pub fn attachments(fabric: &str, names: &[String]) -> Endpoint {
                Endpoint::new(
                    Verb::Get,
                    format!(
                        "{}/fabrics/{}/{}/attachments?{}={}",
                        TOP_DOWN,
                        fabric,
                        $collection,
                        $names_param,
                        names.join(",")
                    ),
                )
            }

            /// Attach or detach switches
            pub fn attach(fabric: &str) -> Endpoint {
                Endpoint::new(
                    Verb::Post,
                    format!("{}/fabrics/{}/{}/attachments", TOP_DOWN, fabric, $collection),
                )
            }

            /// Deploy pending attachments
            pub fn deploy(fabric: &str) -> Endpoint {
                Endpoint::new(
                    Verb::Post,
                    format!("{}/fabrics/{}/{}/deployments", TOP_DOWN, fabric, $collection),
                )
            }
        }
    };
}

top_down_endpoints!(vrfs, "vrfs", "vrf-names");
top_down_endpoints!(networks, "networks", "network-names");

/// Image policy endpoints.
pub mod image_policies {
    use super::*;

    /// List all image policies
    pub fn list() -> Endpoint {
        Endpoint::new(
            Verb::Get,
            format!("{}/policymgnt/policies", IMAGE_MANAGEMENT),
        )
    }

    /// Create an image policy
    pub fn create() -> Endpoint {
        Endpoint::new(
            Verb::Post,
            format!("{}/policymgnt/platform-policy", IMAGE_MANAGEMENT),
        )
    }

    /// Update an image policy
    pub fn edit() -> Endpoint {
        Endpoint::new(
            Verb::Post,
            format!("{}/policymgnt/edit-policy", IMAGE_MANAGEMENT),
        )
    }

    /// Delete image policies named in the request body
    pub fn delete() -> Endpoint {
        Endpoint::new(
            Verb::Delete,
            format!("{}/policymgnt/policies/delete", IMAGE_MANAGEMENT),
        )
    }
}

/// Bootflash endpoints.
pub mod bootflash {
    use super::*;

    /// List the files on a switch's bootflash partitions
    pub fn info(serial: &str) -> Endpoint {
        Endpoint::new(
            Verb::Get,
            format!(
                "{}/imagemgnt/bootFlash/bootflash-info?serialNumber={}",
                IMAGE_MANAGEMENT, serial
            ),
        )
    }

    /// Delete files named in the request body
    pub fn delete_files() -> Endpoint {
        Endpoint::new(
            Verb::Delete,
            format!("{}/imagemgnt/bootFlash/bootflash-files", IMAGE_MANAGEMENT),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_roots_share_prefix() {
        assert_eq!(API_V1, "/appcenter/cisco/ndfc/api/v1");
        for root in [CONTROL, TOP_DOWN, IMAGE_MANAGEMENT] {
            assert!(root.starts_with(API_V1), "{root}");
        }
        assert_eq!(CONTROL, "/appcenter/cisco/ndfc/api/v1/lan-fabric/rest/control");
    }

    #[test]
    fn test_fabric_endpoints() {
        let ep = fabrics::create("f1", "Easy_Fabric");
        assert_eq!(ep.verb, Verb::Post);
        assert_eq!(
            ep.path,
            "/appcenter/cisco/ndfc/api/v1/lan-fabric/rest/control/fabrics/f1/Easy_Fabric"
        );
        assert_eq!(fabrics::update("f1", "Easy_Fabric").verb, Verb::Put);
        assert_eq!(fabrics::delete("f1").verb, Verb::Delete);
        assert!(fabrics::config_deploy("f1")
            .path
            .ends_with("/fabrics/f1/config-deploy?forceShowRun=false"));
    }

    #[test]
    fn test_config_deploy_switches() {
        let serials = vec!["FDO1".to_string(), "FDO2".to_string()];
        let ep = fabrics::config_deploy_switches("f1", &serials);
        assert!(ep
            .path
            .ends_with("/fabrics/f1/config-deploy/FDO1,FDO2?forceShowRun=false"));
    }

    #[test]
    fn test_maintenance_mode_verbs() {
        let on = fabrics::maintenance_mode("f1", "FDO1", true);
        let off = fabrics::maintenance_mode("f1", "FDO1", false);
        assert_eq!(on.verb, Verb::Post);
        assert_eq!(off.verb, Verb::Delete);
        assert_eq!(on.path, off.path);
        assert!(on.path.ends_with("/fabrics/f1/switches/FDO1/maintenance-mode"));
    }

    #[test]
    fn test_top_down_endpoints() {
        let names = vec!["vrf_1".to_string(), "vrf_2".to_string()];
        assert_eq!(
            vrfs::bulk_delete("f1", &names).path,
            "/appcenter/cisco/ndfc/api/v1/lan-fabric/rest/top-down/fabrics/f1/bulk-delete/vrfs?vrf-names=vrf_1,vrf_2"
        );
        assert!(networks::attachments("f1", &names)
            .path
            .ends_with("/fabrics/f1/networks/attachments?network-names=vrf_1,vrf_2"));
        assert_eq!(vrfs::update("f1", "vrf_1").verb, Verb::Put);
        assert!(networks::deploy("f1").path.ends_with("/networks/deployments"));
    }

    #[test]
    fn test_policy_endpoints() {
        let ids = vec!["POLICY-1".to_string(), "POLICY-2".to_string()];
        assert!(policies::delete(&ids)
            .path
            .ends_with("/policies/policyIds?policyIds=POLICY-1,POLICY-2"));
        assert!(policies::by_switch("FDO1")
            .path
            .ends_with("/policies/switches?serialNumber=FDO1"));
    }

    #[test]
    fn test_image_management_endpoints() {
        assert_eq!(image_policies::edit().verb, Verb::Post);
        assert_eq!(image_policies::delete().verb, Verb::Delete);
        assert!(bootflash::info("FDO1")
            .path
            .ends_with("/imagemgnt/bootFlash/bootflash-info?serialNumber=FDO1"));
    }
}
