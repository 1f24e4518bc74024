//! Address range computation: network + prefix (+ optional offsets) to an
//! inclusive interval of addresses to probe.
//!
//! All address arithmetic wraps modulo 2^32.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::config::DiscoverConfig;
use crate::error::{DiscoverError, Result};

/// Largest host count a single sweep will accept.
pub const MAX_HOSTS: u64 = 1 << 20;

/// The concrete interval a sweep covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostRange {
    pub base: Ipv4Addr,
    pub broadcast: Ipv4Addr,
    pub first: Ipv4Addr,
    pub last: Ipv4Addr,
    /// Addresses in the whole prefix, network and broadcast included.
    pub host_count: u64,
}

impl HostRange {
    /// Number of addresses in `[first, last]`.
    pub fn len(&self) -> u64 {
        let (first, last) = (u32::from(self.first), u32::from(self.last));
        if last >= first {
            u64::from(last - first) + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_config(config: &DiscoverConfig) -> Result<Self> {
        compute_range(
            &config.network,
            config.cidr,
            config.start_host,
            config.end_host,
        )
    }
}

/// Compute the probe interval.
///
/// When both offsets are non-negative they are applied literally to the base
/// address, which may include the network and broadcast addresses. Otherwise
/// the network and broadcast addresses are excluded, except for /31 and /32
/// where the whole prefix is used.
pub fn compute_range(network: &str, prefix: i64, start: i64, end: i64) -> Result<HostRange> {
    if !(0..=32).contains(&prefix) {
        return Err(DiscoverError::InvalidPrefix(prefix));
    }
    let addr: Ipv4Addr = network
        .trim()
        .parse()
        .map_err(|_| DiscoverError::InvalidNetwork(network.to_string()))?;

    let host_count = 1u64 << (32 - prefix);
    if host_count == 0 || host_count > MAX_HOSTS {
        return Err(DiscoverError::HostCount {
            count: host_count,
            limit: MAX_HOSTS,
        });
    }

    let net = Ipv4Net::new(addr, prefix as u8)
        .map_err(|_| DiscoverError::InvalidPrefix(prefix))?;
    let base = u32::from(net.network());
    let broadcast = base.wrapping_add((host_count - 1) as u32);

    let (first, last) = if start >= 0 && end >= 0 {
        (
            base.wrapping_add(start as u64 as u32),
            base.wrapping_add(end as u64 as u32),
        )
    } else if host_count <= 2 {
        (base, broadcast)
    } else {
        (base.wrapping_add(1), broadcast.wrapping_sub(1))
    };

    let range = HostRange {
        base: Ipv4Addr::from(base),
        broadcast: Ipv4Addr::from(broadcast),
        first: Ipv4Addr::from(first),
        last: Ipv4Addr::from(last),
        host_count,
    };

    if range.is_empty() {
        return Err(DiscoverError::EmptyRange {
            first: range.first.to_string(),
            last: range.last.to_string(),
        });
    }

    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_24_excludes_network_and_broadcast() {
        let r = compute_range("192.168.1.0", 24, -1, -1).unwrap();
        assert_eq!(r.base, Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(r.first, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(r.last, Ipv4Addr::new(192, 168, 1, 254));
        assert_eq!(r.broadcast, Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(r.len(), 254);
    }

    #[test]
    fn test_network_is_masked() {
        let r = compute_range("192.168.1.77", 24, -1, -1).unwrap();
        assert_eq!(r.base, Ipv4Addr::new(192, 168, 1, 0));
    }

    #[test]
    fn test_slash_31_and_32_use_whole_prefix() {
        let r = compute_range("10.0.0.6", 31, -1, -1).unwrap();
        assert_eq!(r.host_count, 2);
        assert_eq!(r.first, Ipv4Addr::new(10, 0, 0, 6));
        assert_eq!(r.last, Ipv4Addr::new(10, 0, 0, 7));

        let r = compute_range("10.0.0.9", 32, -1, -1).unwrap();
        assert_eq!(r.host_count, 1);
        assert_eq!(r.first, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(r.last, r.first);
    }

    #[test]
    fn test_slash_30() {
        let r = compute_range("10.0.0.0", 30, -1, -1).unwrap();
        assert_eq!(r.first, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(r.last, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_bounds_hold_for_every_accepted_prefix() {
        for prefix in 0..=32 {
            match compute_range("172.16.200.13", prefix, -1, -1) {
                Ok(r) => {
                    let (base, first, last, bcast) = (
                        u32::from(r.base),
                        u32::from(r.first),
                        u32::from(r.last),
                        u32::from(r.broadcast),
                    );
                    assert!(base <= first && first <= last && last <= bcast, "prefix {prefix}");
                }
                Err(DiscoverError::HostCount { count, .. }) => {
                    assert!(count > MAX_HOSTS, "prefix {prefix}");
                    assert!(prefix < 12);
                }
                Err(e) => panic!("unexpected error for prefix {prefix}: {e}"),
            }
        }
    }

    #[test]
    fn test_explicit_offsets_are_literal() {
        let r = compute_range("192.168.1.0", 24, 0, 255).unwrap();
        assert_eq!(r.first, Ipv4Addr::new(192, 168, 1, 0));
        assert_eq!(r.last, Ipv4Addr::new(192, 168, 1, 255));

        // Offsets past the broadcast address are followed as given.
        let r = compute_range("192.168.1.0", 24, 250, 300).unwrap();
        assert_eq!(r.last, Ipv4Addr::new(192, 168, 2, 44));
    }

    #[test]
    fn test_single_offset_is_ignored() {
        let r = compute_range("192.168.1.0", 24, 10, -1).unwrap();
        assert_eq!(r.first, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_offset_arithmetic_wraps() {
        let r = compute_range("255.255.255.0", 24, 0, 256);
        // end wraps to 0.0.0.0, which is below first.
        assert!(matches!(r, Err(DiscoverError::EmptyRange { .. })));
    }

    #[test]
    fn test_reversed_offsets_are_empty() {
        assert!(matches!(
            compute_range("10.0.0.0", 24, 20, 10),
            Err(DiscoverError::EmptyRange { .. })
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            compute_range("10.0.0.0", 33, -1, -1),
            Err(DiscoverError::InvalidPrefix(33))
        ));
        assert!(matches!(
            compute_range("10.0.0.0", -1, -1, -1),
            Err(DiscoverError::InvalidPrefix(-1))
        ));
        assert!(matches!(
            compute_range("10.0.0.0", 8, -1, -1),
            Err(DiscoverError::HostCount { .. })
        ));
        assert!(matches!(
            compute_range("10.0.0", 24, -1, -1),
            Err(DiscoverError::InvalidNetwork(_))
        ));
    }
}
