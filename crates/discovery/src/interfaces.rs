//! Local interface enumeration and the startup network wait.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// A local IPv4 address the discovery listener can join the group on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastInterface {
    pub name: String,
    pub addr: Ipv4Addr,
}

/// Returns local non-loopback IPv4 interfaces, excluding link-local
/// (169.254.x.x), in the order the OS reports them.
///
/// Interfaces that turn out not to support multicast are weeded out when
/// the listener tries to join the group on them.
pub fn local_ipv4_interfaces() -> Vec<MulticastInterface> {
    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        return Vec::new();
    };

    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(addr) if usable(addr) => Some(MulticastInterface {
                name: iface.name,
                addr,
            }),
            _ => None,
        })
        .collect()
}

fn usable(addr: Ipv4Addr) -> bool {
    !addr.is_loopback() && !addr.is_link_local() && !addr.is_unspecified()
}

/// Blocks until a usable interface shows up, checking once per second.
///
/// Returns `false` if none appeared within `attempts` checks.
pub fn wait_for_network(attempts: u32) -> bool {
    wait_until(attempts, Duration::from_secs(1), || {
        !local_ipv4_interfaces().is_empty()
    })
}

fn wait_until(attempts: u32, backoff: Duration, mut ready: impl FnMut() -> bool) -> bool {
    for attempt in 1..=attempts.max(1) {
        if ready() {
            return true;
        }
        tracing::info!(attempt, attempts, "network not ready, retrying");
        if attempt < attempts {
            std::thread::sleep(backoff);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_loopback_and_link_local() {
        assert!(!usable(Ipv4Addr::LOCALHOST));
        assert!(!usable(Ipv4Addr::new(169, 254, 3, 4)));
        assert!(!usable(Ipv4Addr::UNSPECIFIED));
        assert!(usable(Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn local_interfaces_never_include_loopback() {
        for iface in local_ipv4_interfaces() {
            assert!(!iface.addr.is_loopback(), "{iface:?}");
        }
    }

    #[test]
    fn wait_returns_as_soon_as_ready() {
        let mut calls = 0;
        let ok = wait_until(5, Duration::ZERO, || {
            calls += 1;
            calls == 3
        });
        assert!(ok);
        assert_eq!(calls, 3);
    }

    #[test]
    fn wait_gives_up_after_attempts() {
        let mut calls = 0;
        let ok = wait_until(4, Duration::ZERO, || {
            calls += 1;
            false
        });
        assert!(!ok);
        assert_eq!(calls, 4);
    }

    #[test]
    fn zero_attempts_still_checks_once() {
        assert!(wait_until(0, Duration::ZERO, || true));
    }
}
