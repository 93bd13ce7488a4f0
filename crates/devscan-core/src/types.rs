//! Type definitions for devscan.
//!
//! These types mirror the JSON shape of the `announce` message devices send,
//! so they double as the deserialization targets of the protocol layer.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity key of one device announcement stream.
///
/// A device announcing on two of its interfaces produces two paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementPath {
    /// Unique identifier of the device
    pub device_uuid: String,
    /// Name of the device interface the announcement describes
    pub interface_name: String,
}

impl AnnouncementPath {
    pub fn new(device_uuid: impl Into<String>, interface_name: impl Into<String>) -> Self {
        Self {
            device_uuid: device_uuid.into(),
            interface_name: interface_name.into(),
        }
    }
}

impl std::fmt::Display for AnnouncementPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.device_uuid, self.interface_name)
    }
}

/// Parsed `announce` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Device identity
    pub device: DeviceInfo,
    /// Network configuration of the announcing interface
    pub net_settings: NetSettings,
    /// Present when the device is reachable only through a router
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<RouterInfo>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    /// Seconds until the announcement expires (0 means default)
    #[serde(default)]
    pub expiration: u64,
}

impl Announcement {
    /// Identity key of this announcement.
    pub fn path(&self) -> AnnouncementPath {
        AnnouncementPath::new(
            self.device.uuid.clone(),
            self.net_settings.interface.name.clone().unwrap_or_default(),
        )
    }

    /// Effective expiration window: the declared value, never below `floor`.
    pub fn expiration_window(&self, floor: Duration) -> Duration {
        Duration::from_secs(self.expiration).max(floor)
    }

    /// Look up the port of an advertised service by type.
    pub fn service_port(&self, service_type: &str) -> Option<u16> {
        self.services
            .iter()
            .find(|s| s.service_type == service_type)
            .map(|s| s.port)
    }
}

/// Device identity block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Unique device identifier
    pub uuid: String,
    /// Product family, e.g. "QuantumX"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_type: Option<String>,
    /// Device model
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// User-assigned name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_router: Option<bool>,
}

/// Network settings block of an announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetSettings {
    pub interface: NetInterface,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<DefaultGateway>,
}

/// The device interface an announcement was sent from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// "dhcp", "manual" or "routeable"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_method: Option<String>,
    #[serde(default)]
    pub ipv4: Vec<Ipv4Entry>,
    #[serde(default)]
    pub ipv6: Vec<Ipv6Entry>,
}

/// An advertised IPv4 address with its netmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv4Entry {
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl Ipv4Entry {
    pub fn new(address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self { address, netmask }
    }

    /// Prefix length implied by the netmask (popcount of its octets).
    pub fn prefix_len(&self) -> u8 {
        netmask_prefix_len(self.netmask)
    }
}

/// An advertised IPv6 address with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ipv6Entry {
    pub address: Ipv6Addr,
    pub prefix: u8,
}

impl Ipv6Entry {
    pub fn new(address: Ipv6Addr, prefix: u8) -> Self {
        Self { address, prefix }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultGateway {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_address: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_address: Option<Ipv6Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInfo {
    pub uuid: String,
}

/// A service offered by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    pub port: u16,
}

/// Count the set bits of a netmask.
pub fn netmask_prefix_len(netmask: Ipv4Addr) -> u8 {
    netmask
        .octets()
        .iter()
        .map(|octet| octet.count_ones() as u8)
        .sum()
}

/// A tracked device as seen by discovery subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    pub path: AnnouncementPath,
    pub announcement: Arc<Announcement>,
    /// When the announcement carried by this value was received
    pub seen_at: DateTime<Utc>,
}

impl DiscoveredDevice {
    pub fn new(path: AnnouncementPath, announcement: Arc<Announcement>) -> Self {
        Self {
            path,
            announcement,
            seen_at: Utc::now(),
        }
    }
}

/// Discovery event delivered to subscribers.
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// First announcement for a path
    New(DiscoveredDevice),
    /// A refresh whose content differs from the stored announcement
    Updated {
        old: DiscoveredDevice,
        new: DiscoveredDevice,
    },
    /// No refresh within the expiration window
    Lost(DiscoveredDevice),
}

impl DiscoveryEvent {
    pub fn path(&self) -> &AnnouncementPath {
        match self {
            DiscoveryEvent::New(device) | DiscoveryEvent::Lost(device) => &device.path,
            DiscoveryEvent::Updated { new, .. } => &new.path,
        }
    }

    /// The announcement a filter should look at: the newest one known.
    pub fn announcement(&self) -> &Announcement {
        match self {
            DiscoveryEvent::New(device) | DiscoveryEvent::Lost(device) => &device.announcement,
            DiscoveryEvent::Updated { new, .. } => &new.announcement,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryEvent::New(_) => "new",
            DiscoveryEvent::Updated { .. } => "updated",
            DiscoveryEvent::Lost(_) => "lost",
        }
    }
}
