//! Error types for devscan CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use devscan_core::error::CoreError;
use thiserror::Error;

pub use devscan_core::error::{ConfigureError, MonitorError};

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const DEVICE_ERROR: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Device {uuid} rejected the request: {message}")]
    DeviceRejected { uuid: String, message: String },

    #[error("Device {0} not found")]
    DeviceNotFound(String),

    #[error("No reachable address for device {0}")]
    Unreachable(String),

    #[error("No devices found")]
    NoDevicesFound,

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Configure(ConfigureError::InvalidQuery(_)) => exit_codes::INVALID_ARGS,
                CoreError::Configure(ConfigureError::Transport(_)) => exit_codes::NETWORK_ERROR,
                CoreError::Io(_) => exit_codes::NETWORK_ERROR,
                _ => exit_codes::GENERAL_ERROR,
            },
            CliError::Io(_) => exit_codes::NETWORK_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::DeviceRejected { .. } => exit_codes::DEVICE_ERROR,
            CliError::DeviceNotFound(_) => exit_codes::GENERAL_ERROR,
            CliError::Unreachable(_) => exit_codes::NETWORK_ERROR,
            CliError::NoDevicesFound => exit_codes::GENERAL_ERROR,
            CliError::Timeout(_) => exit_codes::NETWORK_ERROR,
        }
    }
}

impl From<ConfigureError> for CliError {
    fn from(e: ConfigureError) -> Self {
        CliError::Core(CoreError::Configure(e))
    }
}

impl From<MonitorError> for CliError {
    fn from(e: MonitorError) -> Self {
        CliError::Core(CoreError::Monitor(e))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
