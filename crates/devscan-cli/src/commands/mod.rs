//! Command implementations.

pub mod configure;
pub mod connect;
pub mod discover;

pub use configure::run_configure;
pub use connect::run_connect;
pub use discover::run_discover;
