//! Receiver Module
//!
//! Receiver session state: the registry of bound connections, the
//! coordinator that keeps the persistent receiver table in step with it, and
//! the field checks applied to ADDR reports.

use std::net::IpAddr;

pub mod coordinator;
pub mod registry;

/// Whether `value` is a colon-separated, six-octet hexadecimal MAC address
pub fn is_mac_address(value: &str) -> bool {
    let octets: Vec<&str> = value.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Parse a receiver-reported IPv4 or IPv6 address
pub fn parse_interface_address(value: &str) -> Option<IpAddr> {
    value.parse().ok()
}

/// Whether `value` looks like a `major.minor.patch` firmware string
///
/// Only the shape is checked; components are not required to be numeric.
pub fn is_firmware_version(value: &str) -> bool {
    value.split('.').count() == 3
}
