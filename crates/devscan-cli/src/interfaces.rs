//! Local network interface enumeration.

use std::net::{IpAddr, Ipv4Addr};

use devscan_core::connect::LocalInterface;
use tracing::debug;

/// Interfaces that are up, in OS enumeration order, with all their addresses.
pub fn local_interfaces() -> Vec<LocalInterface> {
    netdev::get_interfaces()
        .into_iter()
        .filter(|iface| iface.is_up())
        .map(|iface| {
            let mut local = LocalInterface::new(iface.name.clone());
            for net in &iface.ipv4 {
                local = local.with_address(IpAddr::V4(net.addr()), net.prefix_len());
            }
            for net in &iface.ipv6 {
                local = local.with_address(IpAddr::V6(net.addr()), net.prefix_len());
            }
            debug!(interface = %iface.name, addresses = local.addresses.len(), "Local interface");
            local
        })
        .collect()
}

/// IPv4 addresses used to join multicast groups and send configure requests.
///
/// Loopback is skipped unless it is the only interface with an IPv4 address.
pub fn multicast_addresses(interfaces: &[LocalInterface]) -> Vec<Ipv4Addr> {
    let all: Vec<Ipv4Addr> = interfaces
        .iter()
        .flat_map(|iface| iface.addresses.iter())
        .filter_map(|entry| match entry.address {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        })
        .collect();

    let external: Vec<Ipv4Addr> = all.iter().copied().filter(|a| !a.is_loopback()).collect();
    if external.is_empty() {
        all
    } else {
        external
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multicast_addresses_skip_loopback() {
        let interfaces = vec![
            LocalInterface::new("lo").with_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 8),
            LocalInterface::new("eth0")
                .with_address(IpAddr::V4(Ipv4Addr::new(172, 19, 200, 1)), 16)
                .with_address("fe80::1".parse().unwrap(), 64),
        ];
        assert_eq!(
            multicast_addresses(&interfaces),
            vec![Ipv4Addr::new(172, 19, 200, 1)]
        );
    }

    #[test]
    fn test_multicast_addresses_loopback_only() {
        let interfaces =
            vec![LocalInterface::new("lo").with_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 8)];
        assert_eq!(multicast_addresses(&interfaces), vec![Ipv4Addr::LOCALHOST]);
    }
}
