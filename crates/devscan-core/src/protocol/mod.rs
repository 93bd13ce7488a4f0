//! Protocol layer for device communication.
//!
//! Devices speak JSON-RPC 2.0 over multicast. This module decides the message
//! kind once, at the deserialization boundary, and builds outgoing requests.

pub mod message;
pub mod request;

pub use message::{parse_message, ConfigurationResponse, Message, ResponseError};
pub use request::encode_configure_request;

/// JSON-RPC version string carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";
