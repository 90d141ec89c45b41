use serde::{Deserialize, Serialize};

use super::network::{subnet_of, AddressError};

/// An egress proxy as reported by the proxy directory. Transient; never persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressEndpoint {
    /// `host:port` the transport connects through
    pub address: String,
    /// The public IP the target site currently sees for this endpoint
    pub current_external_ip: String,
    /// Remaining work quota reported by the directory
    pub remaining_quota: u32,
}

impl EgressEndpoint {
    pub fn new(
        address: impl Into<String>,
        current_external_ip: impl Into<String>,
        remaining_quota: u32,
    ) -> Self {
        Self {
            address: address.into(),
            current_external_ip: current_external_ip.into(),
            remaining_quota,
        }
    }

    pub fn subnet(&self) -> Result<String, AddressError> {
        subnet_of(&self.current_external_ip)
    }
}
