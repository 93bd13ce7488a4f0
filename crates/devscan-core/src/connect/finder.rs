//! Connection finder.
//!
//! An advertised address is reachable when some local interface carries an
//! address of the same family, with the same prefix length, inside the same
//! network under the advertised prefix. The first match in enumeration order
//! wins; there is no scoring.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

use crate::types::{Announcement, Ipv4Entry, Ipv6Entry};

/// An address configured on a local interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceAddress {
    pub address: IpAddr,
    pub prefix_len: u8,
}

/// A local network interface and its configured addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInterface {
    pub name: String,
    pub addresses: Vec<InterfaceAddress>,
}

impl LocalInterface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addresses: Vec::new(),
        }
    }

    pub fn with_address(mut self, address: IpAddr, prefix_len: u8) -> Self {
        self.addresses.push(InterfaceAddress {
            address,
            prefix_len,
        });
        self
    }

    fn ipv4(&self) -> impl Iterator<Item = (Ipv4Addr, u8)> + '_ {
        self.addresses.iter().filter_map(|a| match a.address {
            IpAddr::V4(v4) => Some((v4, a.prefix_len)),
            IpAddr::V6(_) => None,
        })
    }

    fn ipv6(&self) -> impl Iterator<Item = (Ipv6Addr, u8)> + '_ {
        self.addresses.iter().filter_map(|a| match a.address {
            IpAddr::V6(v6) => Some((v6, a.prefix_len)),
            IpAddr::V4(_) => None,
        })
    }
}

/// A device address the local host can route to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReachableAddress {
    pub address: IpAddr,
    pub prefix_len: u8,
    /// Local interface the address was matched against
    pub interface_name: String,
}

/// Whether `a` and `b` share their top `prefix_len` bits.
pub fn same_subnet_v4(a: Ipv4Addr, b: Ipv4Addr, prefix_len: u8) -> bool {
    if prefix_len > 32 {
        return false;
    }
    let shift = 32 - u32::from(prefix_len);
    let a = u32::from(a).checked_shr(shift).unwrap_or(0);
    let b = u32::from(b).checked_shr(shift).unwrap_or(0);
    a == b
}

/// Whether `a` and `b` share their top `prefix_len` bits.
pub fn same_subnet_v6(a: Ipv6Addr, b: Ipv6Addr, prefix_len: u8) -> bool {
    if prefix_len > 128 {
        return false;
    }
    let shift = 128 - u32::from(prefix_len);
    let a = u128::from(a).checked_shr(shift).unwrap_or(0);
    let b = u128::from(b).checked_shr(shift).unwrap_or(0);
    a == b
}

fn find_ipv4(entries: &[Ipv4Entry], interfaces: &[LocalInterface]) -> Option<ReachableAddress> {
    for entry in entries {
        let prefix_len = entry.prefix_len();
        for interface in interfaces {
            for (local, local_prefix) in interface.ipv4() {
                if local_prefix == prefix_len && same_subnet_v4(entry.address, local, prefix_len) {
                    return Some(ReachableAddress {
                        address: IpAddr::V4(entry.address),
                        prefix_len,
                        interface_name: interface.name.clone(),
                    });
                }
            }
        }
    }
    None
}

fn find_ipv6(entries: &[Ipv6Entry], interfaces: &[LocalInterface]) -> Option<ReachableAddress> {
    for entry in entries {
        for interface in interfaces {
            for (local, local_prefix) in interface.ipv6() {
                if local_prefix == entry.prefix && same_subnet_v6(entry.address, local, entry.prefix)
                {
                    return Some(ReachableAddress {
                        address: IpAddr::V6(entry.address),
                        prefix_len: entry.prefix,
                        interface_name: interface.name.clone(),
                    });
                }
            }
        }
    }
    None
}

/// Pick an advertised address of `announcement` reachable from `interfaces`.
///
/// The preferred family is tried first, then the other one.
pub fn find_reachable(
    announcement: &Announcement,
    interfaces: &[LocalInterface],
    prefer_ipv6: bool,
) -> Option<ReachableAddress> {
    let advertised = &announcement.net_settings.interface;
    if prefer_ipv6 {
        find_ipv6(&advertised.ipv6, interfaces).or_else(|| find_ipv4(&advertised.ipv4, interfaces))
    } else {
        find_ipv4(&advertised.ipv4, interfaces).or_else(|| find_ipv6(&advertised.ipv6, interfaces))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures;

    fn announce_v4(address: &str, netmask: &str) -> Announcement {
        let mut announcement = fixtures::announcement("a");
        announcement.net_settings.interface.ipv4 =
            vec![Ipv4Entry::new(address.parse().unwrap(), netmask.parse().unwrap())];
        announcement.net_settings.interface.ipv6.clear();
        announcement
    }

    fn announce_v6(address: &str, prefix: u8) -> Announcement {
        let mut announcement = fixtures::announcement("a");
        announcement.net_settings.interface.ipv4.clear();
        announcement.net_settings.interface.ipv6 =
            vec![Ipv6Entry::new(address.parse().unwrap(), prefix)];
        announcement
    }

    fn local(name: &str, address: &str, prefix_len: u8) -> LocalInterface {
        LocalInterface::new(name).with_address(address.parse().unwrap(), prefix_len)
    }

    #[test]
    fn test_ipv4_same_subnet() {
        let announcement = announce_v4("172.19.1.2", "255.255.0.0");
        let interfaces = vec![local("eth0", "172.19.1.5", 16)];

        let found = find_reachable(&announcement, &interfaces, false).unwrap();
        assert_eq!(found.address, "172.19.1.2".parse::<IpAddr>().unwrap());
        assert_eq!(found.interface_name, "eth0");
        assert_eq!(found.prefix_len, 16);
    }

    #[test]
    fn test_ipv4_different_subnet() {
        let announcement = announce_v4("172.19.1.2", "255.255.255.0");
        let interfaces = vec![local("eth0", "172.19.2.5", 24)];
        assert!(find_reachable(&announcement, &interfaces, false).is_none());
    }

    #[test]
    fn test_ipv4_prefix_mismatch() {
        let announcement = announce_v4("172.19.1.2", "255.255.0.0");
        let interfaces = vec![local("eth0", "172.19.1.5", 24)];
        assert!(find_reachable(&announcement, &interfaces, false).is_none());
    }

    #[test]
    fn test_ipv6_same_subnet() {
        let announcement = announce_v6("fe80::222:4dff:feaa:4c1e", 64);
        let interfaces = vec![local("eth1", "fe80::333:4dff:feaa:4c1f", 64)];

        let found = find_reachable(&announcement, &interfaces, true).unwrap();
        assert_eq!(found.interface_name, "eth1");
        assert_eq!(found.prefix_len, 64);
    }

    #[test]
    fn test_ipv6_prefix_57_does_not_match_64() {
        let announcement = announce_v6("fe80::222:4dff:feaa:4c1e", 57);
        let interfaces = vec![local("eth1", "fe80::333:4dff:feaa:4c1f", 64)];
        assert!(find_reachable(&announcement, &interfaces, true).is_none());
    }

    #[test]
    fn test_ipv6_different_top_bits() {
        let announcement = announce_v6("fdfb::222:4dff:feaa:4c1e", 64);
        let interfaces = vec![local("eth1", "fe80::333:4dff:feaa:4c1f", 64)];
        assert!(find_reachable(&announcement, &interfaces, true).is_none());
    }

    #[test]
    fn test_bit_granular_prefix() {
        let a: Ipv6Addr = "2001:db8:0:80::1".parse().unwrap();
        let b: Ipv6Addr = "2001:db8:0:ff::1".parse().unwrap();
        assert!(same_subnet_v6(a, b, 57));
        assert!(!same_subnet_v6(a, b, 58));

        let a = Ipv4Addr::new(10, 0, 0, 1);
        assert!(same_subnet_v4(a, Ipv4Addr::new(10, 0, 0, 127), 25));
        assert!(!same_subnet_v4(a, Ipv4Addr::new(10, 0, 0, 128), 25));
        assert!(same_subnet_v4(a, Ipv4Addr::new(192, 168, 0, 1), 0));
    }

    #[test]
    fn test_family_preference_and_fallback() {
        // fixture advertises 172.19.1.2/16 and fe80::222:4dff:feaa:4c1e/64
        let announcement = fixtures::announcement("a");
        let interfaces = vec![
            local("eth0", "172.19.200.1", 16),
            local("eth1", "fe80::1", 64),
        ];

        let v4 = find_reachable(&announcement, &interfaces, false).unwrap();
        assert!(v4.address.is_ipv4());
        let v6 = find_reachable(&announcement, &interfaces, true).unwrap();
        assert!(v6.address.is_ipv6());

        let only_v4 = vec![local("eth0", "172.19.200.1", 16)];
        let fallback = find_reachable(&announcement, &only_v4, true).unwrap();
        assert_eq!(fallback.interface_name, "eth0");
    }

    #[test]
    fn test_first_interface_wins() {
        let announcement = announce_v4("10.1.2.3", "255.0.0.0");
        let interfaces = vec![
            local("wlan0", "192.168.1.4", 24),
            local("eth0", "10.9.9.9", 8),
            local("eth1", "10.1.1.1", 8),
        ];
        let found = find_reachable(&announcement, &interfaces, false).unwrap();
        assert_eq!(found.interface_name, "eth0");
    }
}
