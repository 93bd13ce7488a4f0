//! Runtime settings for the discovery and configuration engine.
//!
//! Every component receives its settings at construction. Consumers (the CLI,
//! tests, embedding applications) decide where values come from.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Expiration applied when an announcement declares `expiration == 0`.
pub const DEFAULT_EXPIRATION_SECS: u64 = 6;

/// Default multicast group devices announce on.
pub const ANNOUNCE_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 77, 76);

/// Default UDP port devices announce on.
pub const ANNOUNCE_PORT: u16 = 31416;

/// Default multicast group devices listen for configure requests on.
pub const CONFIGURE_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 77, 77);

/// Default UDP port devices listen for configure requests on.
pub const CONFIGURE_PORT: u16 = 31417;

/// Liveness monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorSettings {
    /// Lower bound for the expiration window, in seconds
    pub default_expiration_secs: u64,
    /// Upper bound on tracked devices
    pub max_devices: usize,
}

impl MonitorSettings {
    pub fn default_expiration(&self) -> Duration {
        Duration::from_secs(self.default_expiration_secs)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            default_expiration_secs: DEFAULT_EXPIRATION_SECS,
            max_devices: 4096,
        }
    }
}

/// Duplicate-suppression cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheSettings {
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_entries: 4096 }
    }
}

/// Configuration correlator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorrelatorSettings {
    /// Timeout used when a query does not carry its own
    pub default_timeout_ms: u64,
    /// Upper bound on in-flight queries
    pub max_pending: usize,
    /// Hop limit used when a query does not carry its own
    pub default_ttl: u32,
}

impl CorrelatorSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for CorrelatorSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5000,
            max_pending: 1024,
            default_ttl: 1,
        }
    }
}

/// Multicast transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportSettings {
    pub announce_group: Ipv4Addr,
    pub announce_port: u16,
    pub configure_group: Ipv4Addr,
    pub configure_port: u16,
    /// Largest datagram accepted by the listener
    pub max_datagram: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            announce_group: ANNOUNCE_GROUP,
            announce_port: ANNOUNCE_PORT,
            configure_group: CONFIGURE_GROUP,
            configure_port: CONFIGURE_PORT,
            max_datagram: 65_507,
        }
    }
}

/// All engine settings in one place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevscanSettings {
    pub monitor: MonitorSettings,
    pub cache: CacheSettings,
    pub correlator: CorrelatorSettings,
    pub transport: TransportSettings,
}
