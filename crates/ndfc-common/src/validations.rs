//! Field-level validation of user configuration.
//!
//! Each validator takes the field name (used in the error) and the value,
//! and returns [`NdfcError::InvalidConfig`] when the value is malformed.
//!
//! # Example
//!
//! ```
//! use ndfc_common::validations::{validate_vlan_id, validate_asn};
//!
//! assert!(validate_vlan_id("vlan_id", 100).is_ok());
//! assert!(validate_vlan_id("vlan_id", 4095).is_err());
//! assert!(validate_asn("bgp_as", "65000.100").is_ok());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{NdfcError, NdfcResult};

/// Lowest usable VLAN ID.
pub const VLAN_MIN: u16 = 2;
/// Highest usable VLAN ID.
pub const VLAN_MAX: u16 = 4094;
/// Lowest VXLAN network identifier.
pub const VNI_MIN: u32 = 1;
/// Highest VXLAN network identifier.
pub const VNI_MAX: u32 = 16_777_214;
/// Smallest MTU the controller accepts.
pub const MTU_MIN: u16 = 576;
/// Largest MTU the controller accepts.
pub const MTU_MAX: u16 = 9216;
/// Maximum length of VRF and network names.
pub const OBJECT_NAME_MAX: usize = 32;

/// Fabric names: start with a letter, then letters, digits, `_` or `-`.
static FABRIC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]{0,63}$").expect("Invalid regex pattern"));

/// VRF and network names: letters, digits, `_`, `-` and `.`.
static OBJECT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("Invalid regex pattern"));

/// Switch serial numbers.
static SERIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9]{1,32}$").expect("Invalid regex pattern"));

/// MAC addresses in colon, hyphen or dotted-quad notation.
static MAC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[0-9a-fA-F]{2}(?::[0-9a-fA-F]{2}){5}|[0-9a-fA-F]{2}(?:-[0-9a-fA-F]{2}){5}|[0-9a-fA-F]{4}(?:\.[0-9a-fA-F]{4}){2})$",
    )
    .expect("Invalid regex pattern")
});

fn invalid(field: &str, message: impl Into<String>) -> NdfcError {
    NdfcError::invalid_config(field, message)
}

fn all_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn split_prefix<'a>(field: &str, value: &'a str) -> NdfcResult<(&'a str, u8)> {
    let (addr, len) = value
        .split_once('/')
        .ok_or_else(|| invalid(field, format!("'{}' is missing a prefix length", value)))?;
    let len = Some(len)
        .filter(|len| all_digits(len))
        .and_then(|len| len.parse::<u8>().ok())
        .ok_or_else(|| invalid(field, format!("'{}' has an invalid prefix length", value)))?;
    Ok((addr, len))
}

/// Validates an IPv4 address without prefix.
pub fn validate_ipv4_address(field: &str, value: &str) -> NdfcResult<()> {
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| invalid(field, format!("'{}' is not a valid IPv4 address", value)))
}

/// Validates an IPv4 address with prefix length, e.g. `10.1.1.1/24`.
pub fn validate_ipv4_prefix(field: &str, value: &str) -> NdfcResult<()> {
    let (addr, len) = split_prefix(field, value)?;
    validate_ipv4_address(field, addr)?;
    if len > 32 {
        return Err(invalid(field, format!("'{}' prefix length exceeds 32", value)));
    }
    Ok(())
}

/// Validates an IPv4 host address with prefix length.
///
/// For prefixes shorter than /31 the host part must be neither all zeros
/// (network address) nor all ones (broadcast address).
pub fn validate_ipv4_host(field: &str, value: &str) -> NdfcResult<()> {
    validate_ipv4_prefix(field, value)?;
    let (addr, len) = split_prefix(field, value)?;
    if len >= 31 {
        return Ok(());
    }
    let addr: u32 = addr
        .parse::<Ipv4Addr>()
        .map_err(|_| invalid(field, format!("'{}' is not a valid IPv4 address", value)))?
        .into();
    let host_mask = u32::MAX >> len;
    match addr & host_mask {
        0 => Err(invalid(field, format!("'{}' is a network address", value))),
        bits if bits == host_mask => {
            Err(invalid(field, format!("'{}' is a broadcast address", value)))
        }
        _ => Ok(()),
    }
}

/// Validates an IPv6 address without prefix.
pub fn validate_ipv6_address(field: &str, value: &str) -> NdfcResult<()> {
    value
        .parse::<Ipv6Addr>()
        .map(|_| ())
        .map_err(|_| invalid(field, format!("'{}' is not a valid IPv6 address", value)))
}

/// Validates an IPv6 address with prefix length, e.g. `2001:db8::1/64`.
pub fn validate_ipv6_prefix(field: &str, value: &str) -> NdfcResult<()> {
    let (addr, len) = split_prefix(field, value)?;
    validate_ipv6_address(field, addr)?;
    if len > 128 {
        return Err(invalid(field, format!("'{}' prefix length exceeds 128", value)));
    }
    Ok(())
}

/// Validates a VLAN ID.
pub fn validate_vlan_id(field: &str, value: u16) -> NdfcResult<()> {
    if (VLAN_MIN..=VLAN_MAX).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{} must be between {} and {}", value, VLAN_MIN, VLAN_MAX),
        ))
    }
}

/// Validates a VXLAN network identifier.
pub fn validate_vni(field: &str, value: u32) -> NdfcResult<()> {
    if (VNI_MIN..=VNI_MAX).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{} must be between {} and {}", value, VNI_MIN, VNI_MAX),
        ))
    }
}

/// Validates a BGP AS number in plain (`65000`) or asdot (`65000.100`)
/// notation.
pub fn validate_asn(field: &str, value: &str) -> NdfcResult<()> {
    let err = || invalid(field, format!("'{}' is not a valid BGP AS number", value));
    if !value.split('.').all(all_digits) {
        return Err(err());
    }

    match value.split_once('.') {
        None => match value.parse::<u32>() {
            Ok(asn) if asn >= 1 => Ok(()),
            _ => Err(err()),
        },
        Some((high, low)) => {
            let high = high.parse::<u16>().map_err(|_| err())?;
            low.parse::<u16>().map_err(|_| err())?;
            if high >= 1 {
                Ok(())
            } else {
                Err(err())
            }
        }
    }
}

/// Validates a MAC address.
pub fn validate_mac(field: &str, value: &str) -> NdfcResult<()> {
    if MAC_RE.is_match(value) {
        Ok(())
    } else {
        Err(invalid(field, format!("'{}' is not a valid MAC address", value)))
    }
}

/// Validates a fabric name.
pub fn validate_fabric_name(field: &str, value: &str) -> NdfcResult<()> {
    if FABRIC_NAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!(
                "'{}' must start with a letter and contain at most 64 letters, digits, '_' or '-'",
                value
            ),
        ))
    }
}

/// Validates a VRF or network name.
pub fn validate_object_name(field: &str, value: &str) -> NdfcResult<()> {
    if value.is_empty() || value.len() > OBJECT_NAME_MAX {
        return Err(invalid(
            field,
            format!("'{}' must be 1 to {} characters", value, OBJECT_NAME_MAX),
        ));
    }
    if !OBJECT_NAME_RE.is_match(value) {
        return Err(invalid(
            field,
            format!("'{}' may contain only letters, digits, '_', '-' and '.'", value),
        ));
    }
    Ok(())
}

/// Validates a switch serial number.
pub fn validate_serial_number(field: &str, value: &str) -> NdfcResult<()> {
    if SERIAL_RE.is_match(value) {
        Ok(())
    } else {
        Err(invalid(field, format!("'{}' is not a valid serial number", value)))
    }
}

/// Validates an interface MTU.
pub fn validate_mtu(field: &str, value: u16) -> NdfcResult<()> {
    if (MTU_MIN..=MTU_MAX).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{} must be between {} and {}", value, MTU_MIN, MTU_MAX),
        ))
    }
}

/// Validates a TCP/UDP port number.
pub fn validate_port(field: &str, value: u32) -> NdfcResult<()> {
    validate_range(field, value, 1, 65535)
}

/// Validates that an integer lies within an inclusive range.
pub fn validate_range<T>(field: &str, value: T, min: T, max: T) -> NdfcResult<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{} must be between {} and {}", value, min, max),
        ))
    }
}

/// Validates that a string is not empty.
pub fn validate_not_empty(field: &str, value: &str) -> NdfcResult<()> {
    if value.trim().is_empty() {
        Err(invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}
