//! Configuration request values.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigureError;
use crate::protocol::ConfigurationResponse;

/// IPv4 configuration method requested for an interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Ipv4Config {
    Dhcp,
    Manual {
        address: Ipv4Addr,
        netmask: Ipv4Addr,
    },
}

/// Network settings to apply to one device interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetSettingsRequest {
    pub interface_name: String,
    pub ipv4: Ipv4Config,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<Ipv4Addr>,
}

impl NetSettingsRequest {
    pub fn dhcp(interface_name: impl Into<String>) -> Self {
        Self {
            interface_name: interface_name.into(),
            ipv4: Ipv4Config::Dhcp,
            default_gateway: None,
        }
    }

    pub fn manual(interface_name: impl Into<String>, address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            interface_name: interface_name.into(),
            ipv4: Ipv4Config::Manual { address, netmask },
            default_gateway: None,
        }
    }

    pub fn with_gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.default_gateway = Some(gateway);
        self
    }

    /// Reject requests a device could not apply.
    pub fn validate(&self) -> Result<(), ConfigureError> {
        if self.interface_name.is_empty() {
            return Err(ConfigureError::InvalidQuery(
                "interface name cannot be empty".to_string(),
            ));
        }

        if let Ipv4Config::Manual { address, netmask } = &self.ipv4 {
            let mask = u32::from(*netmask);
            // Contiguous masks have the form 1...10...0
            if mask.leading_ones() + mask.trailing_zeros() != 32 {
                return Err(ConfigureError::InvalidQuery(format!(
                    "netmask {} is not contiguous",
                    netmask
                )));
            }
            if address.is_unspecified() || address.is_multicast() || address.is_broadcast() {
                return Err(ConfigureError::InvalidQuery(format!(
                    "address {} cannot be assigned to an interface",
                    address
                )));
            }
        }

        Ok(())
    }
}

/// A configure request addressed to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationQuery {
    pub target_device_uuid: String,
    pub net_settings: NetSettingsRequest,
    /// Multicast hop limit; correlator default when `None`
    pub ttl: Option<u32>,
    /// Response deadline; correlator default when `None`
    pub timeout: Option<Duration>,
}

impl ConfigurationQuery {
    pub fn new(target_device_uuid: impl Into<String>, net_settings: NetSettingsRequest) -> Self {
        Self {
            target_device_uuid: target_device_uuid.into(),
            net_settings,
            ttl: None,
            timeout: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigureError> {
        if self.target_device_uuid.is_empty() {
            return Err(ConfigureError::InvalidQuery(
                "target device uuid cannot be empty".to_string(),
            ));
        }
        self.net_settings.validate()
    }
}

/// The single outcome of a configuration request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationOutcome {
    Success(ConfigurationResponse),
    Error(ConfigurationResponse),
    Timeout { elapsed_millis: u64 },
}

impl ConfigurationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConfigurationOutcome::Success(_))
    }
}

/// Callback receiving the outcome of a request. Called at most once.
pub type OutcomeCallback = Box<dyn FnOnce(ConfigurationOutcome) + Send + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_request_validates() {
        let request = NetSettingsRequest::manual(
            "eth0",
            Ipv4Addr::new(172, 19, 1, 2),
            Ipv4Addr::new(255, 255, 0, 0),
        );
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_non_contiguous_netmask_rejected() {
        let request = NetSettingsRequest::manual(
            "eth0",
            Ipv4Addr::new(172, 19, 1, 2),
            Ipv4Addr::new(255, 0, 255, 0),
        );
        assert!(matches!(
            request.validate(),
            Err(ConfigureError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_query_requires_uuid_and_interface() {
        let query = ConfigurationQuery::new("", NetSettingsRequest::dhcp("eth0"));
        assert!(query.validate().is_err());

        let query = ConfigurationQuery::new("0009E5001234", NetSettingsRequest::dhcp(""));
        assert!(query.validate().is_err());
    }
}
