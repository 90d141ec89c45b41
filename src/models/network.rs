//! IPv4 origin helpers.
//!
//! A subnet here is the first three octets of an IPv4 address ("175.223.27"
//! for "175.223.27.192"). It is the coarse identity the defended site
//! correlates sessions against.

use std::net::Ipv4Addr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Not an IPv4 address: '{0}'")]
    InvalidIpv4(String),
}

/// Derive the /24 subnet key of an IPv4 address
pub fn subnet_of(ip: &str) -> Result<String, AddressError> {
    let addr: Ipv4Addr = ip
        .trim()
        .parse()
        .map_err(|_| AddressError::InvalidIpv4(ip.to_string()))?;
    let [a, b, c, _] = addr.octets();
    Ok(format!("{a}.{b}.{c}"))
}

/// True when both addresses parse and share a /24 subnet
pub fn same_subnet(left: &str, right: &str) -> bool {
    match (subnet_of(left), subnet_of(right)) {
        (Ok(l), Ok(r)) => l == r,
        _ => false,
    }
}
