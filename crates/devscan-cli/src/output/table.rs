//! Table-formatted output for CLI.

use chrono::Local;
use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use devscan_core::configure::ConfigurationOutcome;
use devscan_core::connect::ReachableAddress;
use devscan_core::types::{Announcement, DiscoveredDevice, DiscoveryEvent};

use super::OutputFormatter;

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }

    fn ipv4_summary(announcement: &Announcement) -> String {
        let addresses: Vec<String> = announcement
            .net_settings
            .interface
            .ipv4
            .iter()
            .map(|entry| format!("{}/{}", entry.address, entry.prefix_len()))
            .collect();
        if addresses.is_empty() {
            "-".to_string()
        } else {
            addresses.join(", ")
        }
    }

    fn or_dash(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("-")
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_devices(&self, devices: &[DiscoveredDevice]) -> String {
        if devices.is_empty() {
            return "No devices found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            "UUID", "Interface", "Family", "Type", "Name", "Firmware", "IPv4", "Router",
        ]);

        for device in devices {
            let info = &device.announcement.device;
            let router = device
                .announcement
                .router
                .as_ref()
                .map(|r| r.uuid.as_str())
                .unwrap_or("-");
            table.add_row(vec![
                Cell::new(&device.path.device_uuid),
                Cell::new(&device.path.interface_name),
                Cell::new(Self::or_dash(&info.family_type)),
                Cell::new(Self::or_dash(&info.device_type)),
                Cell::new(Self::or_dash(&info.name)),
                Cell::new(Self::or_dash(&info.firmware_version)),
                Cell::new(Self::ipv4_summary(&device.announcement)),
                Cell::new(router),
            ]);
        }

        format!("{}\n\nFound {} device(s)", table, devices.len())
    }

    fn format_event(&self, event: &DiscoveryEvent) -> String {
        let tag = match event {
            DiscoveryEvent::New(_) => "[NEW]".green(),
            DiscoveryEvent::Updated { .. } => "[UPD]".yellow(),
            DiscoveryEvent::Lost(_) => "[LOST]".red(),
        };
        let seen_at = match event {
            DiscoveryEvent::New(device) | DiscoveryEvent::Lost(device) => device.seen_at,
            DiscoveryEvent::Updated { new, .. } => new.seen_at,
        };
        let announcement = event.announcement();
        format!(
            "{} {} {} {} {}",
            seen_at.with_timezone(&Local).format("%H:%M:%S").to_string().dimmed(),
            tag,
            event.path(),
            Self::or_dash(&announcement.device.family_type),
            Self::ipv4_summary(announcement).dimmed()
        )
    }

    fn format_reachable(&self, device: &DiscoveredDevice, reachable: &ReachableAddress) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Device: {}", device.path));
        lines.push(format!("  Address:    {}/{}", reachable.address, reachable.prefix_len));
        lines.push(format!("  Via:        {}", reachable.interface_name));
        if let Some(port) = device.announcement.service_port("http") {
            lines.push(format!("  HTTP port:  {}", port));
        }
        lines.join("\n")
    }

    fn format_outcome(&self, uuid: &str, outcome: &ConfigurationOutcome) -> String {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["UUID", "Status", "Result"]);

        let (status, detail) = match outcome {
            ConfigurationOutcome::Success(response) => (
                Cell::new("OK").fg(Color::Green),
                response
                    .result
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ),
            ConfigurationOutcome::Error(response) => (
                Cell::new("FAIL").fg(Color::Red),
                response
                    .error
                    .as_ref()
                    .map(|e| format!("{} ({})", e.message, e.code))
                    .unwrap_or_default(),
            ),
            ConfigurationOutcome::Timeout { elapsed_millis } => (
                Cell::new("TIMEOUT").fg(Color::Yellow),
                format!("No response after {} ms", elapsed_millis),
            ),
        };

        table.add_row(vec![Cell::new(uuid), status, Cell::new(detail)]);
        table.to_string()
    }
}
