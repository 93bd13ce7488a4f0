//! devscan core library.
//!
//! Passive discovery and active network configuration of measurement devices
//! that announce themselves over multicast:
//!
//! - [`discovery`]: duplicate suppression, liveness tracking with TTL
//!   expiration, and filterable New/Updated/Lost event streams
//! - [`connect`]: choose a device address reachable from local interfaces
//! - [`configure`]: send configure requests and correlate their responses
//! - [`protocol`]: JSON-RPC message decoding and request encoding
//! - [`transport`]: UDP multicast listener and request sink
//!
//! # Example
//!
//! ```no_run
//! use devscan_core::discovery::{AnnouncementReceiver, DeviceMonitor, MessageCache};
//! use devscan_core::settings::DevscanSettings;
//! use devscan_core::transport::MulticastListener;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = DevscanSettings::default();
//! let monitor = DeviceMonitor::new(settings.monitor.clone());
//! let receiver = AnnouncementReceiver::new(MessageCache::new(&settings.cache), monitor.clone());
//! let listener = MulticastListener::bind(&settings.transport, &[]).await?;
//!
//! let mut events = monitor.subscribe();
//! tokio::spawn(async move { listener.run(&receiver).await });
//! while let Some(event) = events.recv().await {
//!     println!("{} {}", event.kind(), event.path());
//! }
//! # Ok(())
//! # }
//! ```

pub mod configure;
pub mod connect;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod settings;
pub mod transport;
pub mod types;

pub use error::{CoreError, Result};
