//! UDP multicast transport.
//!
//! Thin collaborator around the engine: receives datagrams into an
//! [`AnnouncementReceiver`](crate::discovery::AnnouncementReceiver) and sends
//! configure requests for the correlator.

pub mod multicast;

pub use multicast::{create_multicast_socket, MulticastListener, MulticastSink};
