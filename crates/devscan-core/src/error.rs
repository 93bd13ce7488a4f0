//! Error types for devscan core.

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configure error: {0}")]
    Configure(#[from] ConfigureError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors raised while decoding or encoding wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to parse message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported JSON-RPC version: {0}")]
    Version(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Message is neither a request nor a response")]
    UnknownKind,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid address '{address}': {message}")]
    InvalidAddress { address: String, message: String },
}

/// Errors raised by the configuration correlator.
#[derive(Debug, Error)]
pub enum ConfigureError {
    #[error("No free correlation id available")]
    ExhaustedIdSpace,

    #[error("Too many pending configuration requests (limit {limit})")]
    TooManyPending { limit: usize },

    #[error("Invalid configuration request: {0}")]
    InvalidQuery(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Correlator has been shut down")]
    NotRunning,

    #[error("Outcome dropped before completion")]
    Cancelled,
}

/// Errors raised by the device liveness monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Device table full (limit {limit})")]
    Capacity { limit: usize },

    #[error("Monitor has been shut down")]
    NotRunning,
}

/// Non-fatal filter evaluation failure.
///
/// Filters report this when an announcement lacks the field they match on.
/// The chain treats it as "does not match".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Announcement is missing {field}")]
    MissingData { field: &'static str },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
