//! Device configuration.
//!
//! Configure requests are fire-and-forget on the wire; the correlator matches
//! asynchronous responses back to the request that caused them.

pub mod correlator;
pub mod query;

pub use correlator::{ConfigCorrelator, OutgoingRequest, RequestSink};
pub use query::{
    ConfigurationOutcome, ConfigurationQuery, Ipv4Config, NetSettingsRequest, OutcomeCallback,
};
