//! Image policy configuration and the controller's policy records.

use ndfc_common::validations::{validate_not_empty, validate_object_name};
use ndfc_common::{Keyed, NdfcError, NdfcResult, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::wire::{lenient_bool, split_csv, string_or_default};

/// Switch platform an image policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Nexus 9000
    N9K,
    /// Nexus 6000
    N6K,
    /// Nexus 7000
    N7K,
    /// Nexus 7700
    N77,
    /// Nexus 3000
    N3K,
    /// Nexus 3500
    N3500,
    /// Nexus 5000
    N5K,
    /// Nexus 5500
    N5500,
    /// Nexus 5600
    N5600,
}

impl Platform {
    /// Platform name as the controller spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::N9K => "N9K",
            Platform::N6K => "N6K",
            Platform::N7K => "N7K",
            Platform::N77 => "N77",
            Platform::N3K => "N3K",
            Platform::N3500 => "N3500",
            Platform::N5K => "N5K",
            Platform::N5500 => "N5500",
            Platform::N5600 => "N5600",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packages (RPMs) to install or uninstall with the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Packages {
    /// Packages installed with the image
    #[serde(default)]
    pub install: Vec<String>,
    /// Packages removed during the upgrade
    #[serde(default)]
    pub uninstall: Vec<String>,
}

/// User configuration for one image policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePolicyConfig {
    /// Policy name, the reconcile key
    pub name: String,
    /// Target platform; required for replaced and overridden
    #[serde(default)]
    pub platform: Option<Platform>,
    /// NX-OS release, e.g. `10.3.1_nxos64-cs_64bit`
    #[serde(default)]
    pub release: Option<String>,
    /// Packages to install or uninstall
    #[serde(default)]
    pub packages: Option<Packages>,
    /// EPLD image file name
    #[serde(default)]
    pub epld_image: Option<String>,
    /// Comma-separated RPMs to disable
    #[serde(default)]
    pub disabled_rpm: Option<String>,
    /// Policy applies regardless of the switch's current image
    #[serde(default)]
    pub agnostic: Option<bool>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
}

impl ImagePolicyConfig {
    /// A policy with only its name set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: None,
            release: None,
            packages: None,
            epld_image: None,
            disabled_rpm: None,
            agnostic: None,
            description: None,
        }
    }

    /// Checks the fields `state` needs. Query and deleted only need a valid name.
    pub fn validate(&self, state: State) -> NdfcResult<()> {
        validate_object_name("name", &self.name)?;
        if matches!(state, State::Query | State::Deleted) {
            return Ok(());
        }
        if matches!(state, State::Replaced | State::Overridden) {
            if self.platform.is_none() {
                return Err(NdfcError::invalid_config(
                    "platform",
                    format!("required for state {}", state),
                ));
            }
            if self.release.is_none() {
                return Err(NdfcError::invalid_config(
                    "release",
                    format!("required for state {}", state),
                ));
            }
        }
        if let Some(release) = &self.release {
            validate_not_empty("release", release)?;
        }
        if let Some(packages) = &self.packages {
            for package in packages.install.iter().chain(&packages.uninstall) {
                validate_not_empty("packages", package)?;
                if package.contains(',') {
                    return Err(NdfcError::invalid_config(
                        "packages",
                        format!("package name '{}' must not contain a comma", package),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Builds the policy from the fields the user set.
    pub fn to_policy(&self) -> ImagePolicy {
        let packages = self.packages.as_ref();
        ImagePolicy {
            policy_name: self.name.clone(),
            platform: self.platform.map(|p| p.to_string()),
            nxos_version: self.release.clone(),
            package_name: packages.map(|p| p.install.clone()),
            rpmimages: packages.map(|p| p.uninstall.clone()),
            disabled_rpm: self.disabled_rpm.clone(),
            policy_descr: self.description.clone(),
            epld_img_name: self.epld_image.clone(),
            agnostic: self.agnostic,
        }
    }
}

/// An image policy. Unset fields are left as the controller has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePolicy {
    pub policy_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nxos_version: Option<String>,
    /// Packages to install
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<Vec<String>>,
    /// Packages to uninstall
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpmimages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_rpm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_descr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epld_img_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agnostic: Option<bool>,
}

impl Keyed for ImagePolicy {
    fn key(&self) -> String {
        self.policy_name.clone()
    }
}

impl ImagePolicy {
    /// Fills unset fields with their defaults.
    pub fn with_defaults(mut self) -> Self {
        self.package_name.get_or_insert_with(Vec::new);
        self.rpmimages.get_or_insert_with(Vec::new);
        self.disabled_rpm.get_or_insert_with(String::new);
        self.policy_descr.get_or_insert_with(String::new);
        self.epld_img_name.get_or_insert_with(String::new);
        self.agnostic.get_or_insert(false);
        self
    }

    /// Request body for platform-policy and edit-policy.
    pub fn to_body(&self) -> Value {
        let join = |list: &Option<Vec<String>>| list.as_deref().unwrap_or_default().join(",");
        json!({
            "policyName": self.policy_name,
            "policyType": "PLATFORM",
            "nxosVersion": self.nxos_version.clone().unwrap_or_default(),
            "packageName": join(&self.package_name),
            "platform": self.platform.clone().unwrap_or_default(),
            "policyDescr": self.policy_descr.clone().unwrap_or_default(),
            "epldImgName": self.epld_img_name.clone().unwrap_or_default(),
            "rpmimages": join(&self.rpmimages),
            "disabledRpm": self.disabled_rpm.clone().unwrap_or_default(),
            "agnostic": self.agnostic.unwrap_or(false),
        })
    }
}

/// List entry as sent by the controller.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawImagePolicy {
    #[serde(default, deserialize_with = "string_or_default")]
    pub policy_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub platform: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub nxos_version: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub package_name: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub rpmimages: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub disabled_rpm: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub policy_descr: String,
    #[serde(default, deserialize_with = "string_or_default")]
    pub epld_img_name: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub agnostic: bool,
    /// Number of switches using the policy
    #[serde(default, rename = "ref_count")]
    pub ref_count: u32,
}

impl From<RawImagePolicy> for ImagePolicy {
    fn from(raw: RawImagePolicy) -> Self {
        Self {
            policy_name: raw.policy_name,
            platform: Some(raw.platform),
            nxos_version: Some(raw.nxos_version),
            package_name: Some(split_csv(&raw.package_name)),
            rpmimages: Some(split_csv(&raw.rpmimages)),
            disabled_rpm: Some(raw.disabled_rpm),
            policy_descr: Some(raw.policy_descr),
            epld_img_name: Some(raw.epld_img_name),
            agnostic: Some(raw.agnostic),
        }
    }
}
