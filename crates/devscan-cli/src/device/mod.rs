//! Device communication for the CLI.

pub mod session;

pub use session::Session;
