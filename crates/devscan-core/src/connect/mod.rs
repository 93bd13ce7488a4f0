//! Reachability of discovered devices.
//!
//! Pure computation over the addresses a device advertises and the addresses
//! configured on local interfaces. Interface enumeration is left to callers.

pub mod finder;

pub use finder::{
    find_reachable, same_subnet_v4, same_subnet_v6, InterfaceAddress, LocalInterface,
    ReachableAddress,
};
