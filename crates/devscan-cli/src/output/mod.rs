//! Output formatting for CLI results.

pub mod json;
pub mod table;

pub use json::JsonOutput;
pub use table::TableOutput;

use devscan_core::configure::ConfigurationOutcome;
use devscan_core::connect::ReachableAddress;
use devscan_core::types::{DiscoveredDevice, DiscoveryEvent};

/// Output formatter trait
pub trait OutputFormatter {
    /// Format device list
    fn format_devices(&self, devices: &[DiscoveredDevice]) -> String;

    /// Format a single discovery event (watch mode)
    fn format_event(&self, event: &DiscoveryEvent) -> String;

    /// Format the address chosen for connecting to a device
    fn format_reachable(&self, device: &DiscoveredDevice, reachable: &ReachableAddress) -> String;

    /// Format the outcome of a configure request
    fn format_outcome(&self, uuid: &str, outcome: &ConfigurationOutcome) -> String;
}

/// Get the appropriate formatter based on JSON flag
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonOutput::new())
    } else {
        Box::new(TableOutput::new())
    }
}
