//! Device liveness monitor.
//!
//! Keeps one record per announcement path. Each record owns the handle of the
//! timer that will expire it. Every read-modify-write of a record (cancel the
//! old timer, compare, replace, re-arm) happens under one lock, and events are
//! queued to subscribers inside that same critical section so that per-path
//! ordering (New before Updated before Lost) holds under concurrent delivery.
//!
//! Timers must be armed from within a tokio runtime.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::filter::FilterChain;
use crate::error::MonitorError;
use crate::settings::MonitorSettings;
use crate::types::{Announcement, AnnouncementPath, DiscoveredDevice, DiscoveryEvent};

/// What a refresh did to the tracked state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    New,
    Updated,
    KeepAlive,
}

struct DeviceRecord {
    device: DiscoveredDevice,
    /// Distinguishes the live timer from ones that lost a cancellation race
    generation: u64,
    timer: JoinHandle<()>,
}

struct MonitorState {
    records: HashMap<AnnouncementPath, DeviceRecord>,
    subscribers: Vec<mpsc::UnboundedSender<DiscoveryEvent>>,
    next_generation: u64,
    running: bool,
}

impl MonitorState {
    fn publish(&mut self, event: DiscoveryEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

struct Shared {
    state: Mutex<MonitorState>,
    settings: MonitorSettings,
}

impl Shared {
    fn expire(&self, path: &AnnouncementPath, generation: u64) {
        let mut state = self.state.lock();

        let live = state.records.get(path).map(|record| record.generation);
        if live != Some(generation) {
            debug!(path = %path, generation, "Stale expiration timer ignored");
            return;
        }

        if let Some(record) = state.records.remove(path) {
            state.publish(DiscoveryEvent::Lost(record.device));
            drop(state);
            info!(path = %path, "Device lost");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for (_, record) in self.state.get_mut().records.drain() {
            record.timer.abort();
        }
    }
}

/// Turns announcement refreshes into discovery events with TTL expiration.
#[derive(Clone)]
pub struct DeviceMonitor {
    shared: Arc<Shared>,
}

impl DeviceMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MonitorState {
                    records: HashMap::new(),
                    subscribers: Vec::new(),
                    next_generation: 0,
                    running: true,
                }),
                settings,
            }),
        }
    }

    /// Subscribe to all discovery events.
    pub fn subscribe(&self) -> EventStream {
        self.subscribe_filtered(FilterChain::new())
    }

    /// Subscribe to events whose announcement passes `filter`.
    ///
    /// Devices already tracked and accepted by `filter` count as seen by the
    /// new subscriber, so it gets their Updated and Lost events but no New.
    /// Subscribing after shutdown yields a stream that is already closed.
    pub fn subscribe_filtered(&self, filter: FilterChain) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let tracked: Vec<DiscoveredDevice> = {
            let mut state = self.shared.state.lock();
            if !state.running {
                Vec::new()
            } else {
                state.subscribers.push(tx);
                state.records.values().map(|r| r.device.clone()).collect()
            }
        };

        // Filters run outside the lock
        let forwarded = tracked
            .into_iter()
            .filter(|device| filter.accepts(&device.announcement))
            .map(|device| device.path)
            .collect();

        EventStream {
            rx,
            filter,
            forwarded,
        }
    }

    /// Record an announcement for its path.
    pub fn refresh(&self, announcement: Arc<Announcement>) -> Result<RefreshOutcome, MonitorError> {
        let path = announcement.path();
        let window = announcement.expiration_window(self.shared.settings.default_expiration());
        let device = DiscoveredDevice::new(path.clone(), announcement);

        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(MonitorError::NotRunning);
        }

        let (event, outcome) = match state.records.remove(&path) {
            Some(previous) => {
                previous.timer.abort();
                if previous.device.announcement == device.announcement {
                    (None, RefreshOutcome::KeepAlive)
                } else {
                    let event = DiscoveryEvent::Updated {
                        old: previous.device,
                        new: device.clone(),
                    };
                    (Some(event), RefreshOutcome::Updated)
                }
            }
            None => {
                let limit = self.shared.settings.max_devices;
                if state.records.len() >= limit {
                    return Err(MonitorError::Capacity { limit });
                }
                (Some(DiscoveryEvent::New(device.clone())), RefreshOutcome::New)
            }
        };

        let generation = state.next_generation;
        state.next_generation += 1;
        let timer = self.arm(path.clone(), generation, window);
        state.records.insert(
            path.clone(),
            DeviceRecord {
                device,
                generation,
                timer,
            },
        );

        if let Some(event) = event {
            state.publish(event);
        }
        drop(state);

        match outcome {
            RefreshOutcome::New => info!(path = %path, ttl_ms = window.as_millis() as u64, "Device discovered"),
            RefreshOutcome::Updated => info!(path = %path, "Device updated"),
            RefreshOutcome::KeepAlive => debug!(path = %path, "Device keep-alive"),
        }

        Ok(outcome)
    }

    fn arm(&self, path: AnnouncementPath, generation: u64, window: Duration) -> JoinHandle<()> {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Some(shared) = shared.upgrade() {
                shared.expire(&path, generation);
            }
        })
    }

    /// Snapshot of tracked devices, ordered by path.
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        let state = self.shared.state.lock();
        let mut devices: Vec<DiscoveredDevice> = state
            .records
            .values()
            .map(|record| record.device.clone())
            .collect();
        devices.sort_by(|a, b| a.path.cmp(&b.path));
        devices
    }

    pub fn get(&self, path: &AnnouncementPath) -> Option<DiscoveredDevice> {
        self.shared
            .state
            .lock()
            .records
            .get(path)
            .map(|record| record.device.clone())
    }

    /// Tracked devices whose uuid matches, one per announcing interface.
    pub fn find_by_uuid(&self, uuid: &str) -> Vec<DiscoveredDevice> {
        self.devices()
            .into_iter()
            .filter(|device| device.path.device_uuid == uuid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Cancel all timers, drop all records and close every subscription.
    ///
    /// No event is emitted after this returns.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        let tracked = state.records.len();
        for (_, record) in state.records.drain() {
            record.timer.abort();
        }
        state.subscribers.clear();
        drop(state);

        info!(tracked, "Device monitor stopped");
    }
}

impl Default for DeviceMonitor {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

/// Receiving end of a discovery subscription.
///
/// The filter chain is applied per path: a subscriber sees New before any
/// Updated for a path, and Lost only for paths it has seen. A device that
/// starts matching shows up as New; one that stops matching shows up as Lost.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<DiscoveryEvent>,
    filter: FilterChain,
    forwarded: HashSet<AnnouncementPath>,
}

impl EventStream {
    /// Wait for the next event that passes the filter chain.
    ///
    /// Returns `None` once the monitor has shut down.
    pub async fn recv(&mut self) -> Option<DiscoveryEvent> {
        while let Some(event) = self.rx.recv().await {
            if let Some(event) = self.admit(event) {
                return Some(event);
            }
        }
        None
    }

    /// Next already-queued event that passes the filter chain, if any.
    pub fn try_recv(&mut self) -> Option<DiscoveryEvent> {
        while let Ok(event) = self.rx.try_recv() {
            if let Some(event) = self.admit(event) {
                return Some(event);
            }
        }
        None
    }

    /// Drain every queued event that passes the filter chain.
    pub fn drain(&mut self) -> Vec<DiscoveryEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    fn admit(&mut self, event: DiscoveryEvent) -> Option<DiscoveryEvent> {
        match event {
            DiscoveryEvent::New(device) => {
                if !self.filter.accepts(&device.announcement) {
                    return None;
                }
                self.forwarded.insert(device.path.clone());
                Some(DiscoveryEvent::New(device))
            }
            DiscoveryEvent::Updated { old, new } => {
                let seen = self.forwarded.contains(&new.path);
                match (seen, self.filter.accepts(&new.announcement)) {
                    (true, true) => Some(DiscoveryEvent::Updated { old, new }),
                    (false, true) => {
                        self.forwarded.insert(new.path.clone());
                        Some(DiscoveryEvent::New(new))
                    }
                    (true, false) => {
                        self.forwarded.remove(&old.path);
                        Some(DiscoveryEvent::Lost(old))
                    }
                    (false, false) => None,
                }
            }
            DiscoveryEvent::Lost(device) => {
                if self.forwarded.remove(&device.path) {
                    Some(DiscoveryEvent::Lost(device))
                } else {
                    None
                }
            }
        }
    }
}
