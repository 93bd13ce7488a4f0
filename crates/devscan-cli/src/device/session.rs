//! A running discovery and configuration engine.
//!
//! Thin wrapper wiring core's monitor, correlator and multicast transport
//! together for the duration of one command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use devscan_core::configure::ConfigCorrelator;
use devscan_core::connect::LocalInterface;
use devscan_core::discovery::{AnnouncementReceiver, DeviceMonitor, MessageCache};
use devscan_core::settings::DevscanSettings;
use devscan_core::transport::{MulticastListener, MulticastSink};
use devscan_core::types::DiscoveredDevice;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::CliError;
use crate::interfaces::{local_interfaces, multicast_addresses};

/// Read settings from `path` if given, then apply the command-line timeout.
///
/// Without an explicit timeout the file value (or the built-in default) stays.
pub fn load_settings(
    path: Option<&Path>,
    timeout_ms: Option<u64>,
) -> Result<DevscanSettings, CliError> {
    let mut settings = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text).map_err(|e| {
                CliError::InvalidArgument(format!("Settings file {}: {}", path.display(), e))
            })?
        }
        None => DevscanSettings::default(),
    };
    if let Some(timeout_ms) = timeout_ms {
        settings.correlator.default_timeout_ms = timeout_ms;
    }
    Ok(settings)
}

pub struct Session {
    monitor: DeviceMonitor,
    correlator: ConfigCorrelator,
    interfaces: Vec<LocalInterface>,
    listener_task: JoinHandle<()>,
}

impl Session {
    /// Join the announcement group and start feeding the monitor.
    pub async fn start(settings: &DevscanSettings) -> Result<Self, CliError> {
        let interfaces = local_interfaces();
        let addresses = multicast_addresses(&interfaces);
        debug!(?addresses, "Multicast interfaces");

        let monitor = DeviceMonitor::new(settings.monitor.clone());
        let sink = MulticastSink::new(&settings.transport, &addresses)?;
        let correlator = ConfigCorrelator::new(Arc::new(sink), settings.correlator.clone());

        let receiver = AnnouncementReceiver::new(MessageCache::new(&settings.cache), monitor.clone())
            .with_correlator(correlator.clone());
        let listener = MulticastListener::bind(&settings.transport, &addresses).await?;

        let listener_task = tokio::spawn(async move {
            if let Err(e) = listener.run(&receiver).await {
                tracing::error!(error = %e, "Listener stopped");
            }
        });

        info!(interfaces = interfaces.len(), "Session started");

        Ok(Self {
            monitor,
            correlator,
            interfaces,
            listener_task,
        })
    }

    pub fn monitor(&self) -> &DeviceMonitor {
        &self.monitor
    }

    pub fn correlator(&self) -> &ConfigCorrelator {
        &self.correlator
    }

    pub fn interfaces(&self) -> &[LocalInterface] {
        &self.interfaces
    }

    /// Wait until a device with `uuid` has announced itself, or `wait` elapses.
    pub async fn wait_for_device(&self, uuid: &str, wait: Duration) -> Vec<DiscoveredDevice> {
        let mut events = self.monitor.subscribe();
        let found = self.monitor.find_by_uuid(uuid);
        if !found.is_empty() {
            return found;
        }

        let deadline = tokio::time::sleep(wait);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return self.monitor.find_by_uuid(uuid),
                event = events.recv() => match event {
                    Some(event) if event.path().device_uuid == uuid && event.kind() != "lost" => {
                        return self.monitor.find_by_uuid(uuid);
                    }
                    Some(_) => {}
                    None => return Vec::new(),
                },
            }
        }
    }

    pub fn shutdown(self) {
        self.listener_task.abort();
        self.correlator.shutdown();
        self.monitor.shutdown();
        debug!("Session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn settings_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_settings_defaults() {
        let settings = load_settings(None, None).unwrap();
        assert_eq!(settings.correlator.default_timeout(), Duration::from_millis(5000));
        assert_eq!(settings.transport.announce_port, 31416);
    }

    #[test]
    fn test_load_settings_cli_timeout_overrides_default() {
        let settings = load_settings(None, Some(1500)).unwrap();
        assert_eq!(settings.correlator.default_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_load_settings_from_file() {
        let file = settings_file(r#"{"monitor":{"defaultExpirationSecs":10}}"#);

        let settings = load_settings(Some(file.path()), None).unwrap();
        assert_eq!(settings.monitor.default_expiration(), Duration::from_secs(10));
        assert_eq!(settings.correlator.default_timeout_ms, 5000);
    }

    #[test]
    fn test_file_timeout_kept_unless_overridden() {
        let file = settings_file(r#"{"correlator":{"defaultTimeoutMs":20000}}"#);

        let settings = load_settings(Some(file.path()), None).unwrap();
        assert_eq!(settings.correlator.default_timeout_ms, 20000);

        let settings = load_settings(Some(file.path()), Some(750)).unwrap();
        assert_eq!(settings.correlator.default_timeout_ms, 750);
    }

    #[test]
    fn test_load_settings_invalid_json() {
        let file = settings_file("not json");

        let result = load_settings(Some(file.path()), None);
        assert!(matches!(result, Err(CliError::InvalidArgument(_))));
    }

    #[test]
    fn test_load_settings_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_settings(Some(&dir.path().join("absent.json")), None);
        assert!(matches!(result, Err(CliError::Io(_))));
    }
}
