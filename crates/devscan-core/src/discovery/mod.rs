//! Device discovery.
//!
//! Raw announcement text flows through the duplicate-suppression cache into
//! the liveness monitor, which turns refreshes into New/Updated/Lost events.
//! Subscribers may narrow the event stream with a filter chain.

pub mod cache;
pub mod filter;
pub mod monitor;
pub mod receiver;

pub use cache::MessageCache;
pub use filter::{AnnouncementFilter, FamilyTypeFilter, FilterChain, UuidFilter};
pub use monitor::{DeviceMonitor, EventStream, RefreshOutcome};
pub use receiver::{AnnouncementReceiver, Handled};
