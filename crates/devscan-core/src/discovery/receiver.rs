//! Receive pipeline: raw message text in, monitor refreshes and correlated
//! responses out.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::cache::MessageCache;
use super::monitor::{DeviceMonitor, EventStream, RefreshOutcome};
use crate::configure::ConfigCorrelator;
use crate::error::CoreError;
use crate::protocol::{parse_message, Message};
use crate::types::DiscoveryEvent;

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// An announcement refreshed the monitor
    Announcement {
        outcome: RefreshOutcome,
        cached: bool,
    },
    /// A response was delivered to the correlator
    Response { matched: bool },
}

/// Feeds raw announcement and response text into the engine.
///
/// Cached text of a path is evicted once the monitor reports it lost.
pub struct AnnouncementReceiver {
    cache: MessageCache,
    monitor: DeviceMonitor,
    correlator: Option<ConfigCorrelator>,
    losses: Mutex<EventStream>,
}

impl AnnouncementReceiver {
    pub fn new(cache: MessageCache, monitor: DeviceMonitor) -> Self {
        let losses = Mutex::new(monitor.subscribe());
        Self {
            cache,
            monitor,
            correlator: None,
            losses,
        }
    }

    /// Route configure responses seen on the wire to `correlator`.
    pub fn with_correlator(mut self, correlator: ConfigCorrelator) -> Self {
        self.correlator = Some(correlator);
        self
    }

    pub fn monitor(&self) -> &DeviceMonitor {
        &self.monitor
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Process one message as received from the transport.
    ///
    /// Byte-identical repeats of a cached announcement skip parsing but still
    /// count as a keep-alive.
    pub fn handle_text(&self, text: &str) -> Result<Handled, CoreError> {
        self.evict_lost();

        if let Some(announcement) = self.cache.lookup(text) {
            let outcome = self.monitor.refresh(announcement)?;
            return Ok(Handled::Announcement {
                outcome,
                cached: true,
            });
        }

        match parse_message(text)? {
            Message::Announce(announcement) => {
                let announcement = Arc::new(announcement);
                self.cache.insert(text, announcement.clone());
                let outcome = self.monitor.refresh(announcement)?;
                Ok(Handled::Announcement {
                    outcome,
                    cached: false,
                })
            }
            Message::Response(response) => {
                let matched = match &self.correlator {
                    Some(correlator) => correlator.handle_response(response),
                    None => {
                        debug!(id = %response.id, "Response received without a correlator");
                        false
                    }
                };
                Ok(Handled::Response { matched })
            }
        }
    }

    fn evict_lost(&self) {
        let mut losses = self.losses.lock();
        while let Some(event) = losses.try_recv() {
            if let DiscoveryEvent::Lost(device) = event {
                debug!(path = %device.path, "Evicting cached announcement");
                self.cache.remove_path(&device.path);
            }
        }
    }

    /// Process a datagram. Payloads that are not UTF-8 are rejected.
    pub fn handle_datagram(&self, data: &[u8]) -> Result<Handled, CoreError> {
        let text = std::str::from_utf8(data)
            .map_err(|e| CoreError::Other(format!("Datagram is not UTF-8: {}", e)))?;
        self.handle_text(text)
    }
}
