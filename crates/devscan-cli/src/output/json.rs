//! JSON-formatted output for CLI.

use devscan_core::configure::ConfigurationOutcome;
use devscan_core::connect::ReachableAddress;
use devscan_core::types::{DiscoveredDevice, DiscoveryEvent};
use serde::Serialize;
use serde_json::{json, Value};

use super::OutputFormatter;

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: Serialize>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    }

    fn outcome_value(uuid: &str, outcome: &ConfigurationOutcome) -> Value {
        match outcome {
            ConfigurationOutcome::Success(response) => json!({
                "uuid": uuid,
                "status": "success",
                "id": response.id,
                "result": response.result,
            }),
            ConfigurationOutcome::Error(response) => json!({
                "uuid": uuid,
                "status": "error",
                "id": response.id,
                "error": response.error,
            }),
            ConfigurationOutcome::Timeout { elapsed_millis } => json!({
                "uuid": uuid,
                "status": "timeout",
                "elapsedMillis": elapsed_millis,
            }),
        }
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for JsonOutput {
    fn format_devices(&self, devices: &[DiscoveredDevice]) -> String {
        let output = json!({
            "devices": devices,
            "count": devices.len()
        });
        Self::to_json(&output)
    }

    fn format_event(&self, event: &DiscoveryEvent) -> String {
        // One compact line per event so watch output can be piped
        let output = match event {
            DiscoveryEvent::New(device) | DiscoveryEvent::Lost(device) => json!({
                "event": event.kind(),
                "device": device,
            }),
            DiscoveryEvent::Updated { old, new } => json!({
                "event": event.kind(),
                "device": new,
                "previous": old,
            }),
        };
        serde_json::to_string(&output).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_reachable(&self, device: &DiscoveredDevice, reachable: &ReachableAddress) -> String {
        Self::to_json(&json!({
            "path": device.path,
            "reachable": reachable,
            "httpPort": device.announcement.service_port("http"),
        }))
    }

    fn format_outcome(&self, uuid: &str, outcome: &ConfigurationOutcome) -> String {
        Self::to_json(&Self::outcome_value(uuid, outcome))
    }
}
