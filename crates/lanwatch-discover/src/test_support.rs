//! In-memory `NetProbe` for unit tests.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;

use crate::probe::{NetProbe, ProbeOutcome};

#[derive(Default)]
pub struct FakeProbe {
    pub reachable: HashSet<Ipv4Addr>,
    pub macs: HashMap<Ipv4Addr, String>,
    pub gateway: Option<Ipv4Addr>,
    pub open_ports: HashSet<(Ipv4Addr, u16)>,
    /// Every probe reports the mechanism as unavailable.
    pub unavailable: bool,
    /// Adds `last octet` milliseconds of latency to each probe.
    pub jitter: bool,
    /// Fixed latency added to every probe.
    pub delay: Option<Duration>,
    pub probed: Mutex<Vec<Ipv4Addr>>,
    pub connects: Mutex<Vec<(Ipv4Addr, u16)>>,
}

impl FakeProbe {
    pub fn with_hosts(hosts: &[(Ipv4Addr, Option<&str>)]) -> Self {
        let mut probe = Self::default();
        for (ip, mac) in hosts {
            probe.reachable.insert(*ip);
            if let Some(mac) = mac {
                probe.macs.insert(*ip, mac.to_string());
            }
        }
        probe
    }

    pub fn probed(&self) -> Vec<Ipv4Addr> {
        self.probed.lock().unwrap().clone()
    }

    pub fn connects(&self) -> Vec<(Ipv4Addr, u16)> {
        self.connects.lock().unwrap().clone()
    }
}

impl NetProbe for FakeProbe {
    async fn probe(&self, ip: Ipv4Addr, _timeout: Duration) -> ProbeOutcome {
        self.probed.lock().unwrap().push(ip);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.jitter {
            tokio::time::sleep(Duration::from_millis(u64::from(ip.octets()[3] % 7))).await;
        }
        if self.unavailable {
            ProbeOutcome::Unavailable
        } else if self.reachable.contains(&ip) {
            ProbeOutcome::Reachable
        } else {
            ProbeOutcome::Unreachable
        }
    }

    async fn hardware_address(&self, ip: Ipv4Addr) -> Option<String> {
        self.macs.get(&ip).cloned()
    }

    async fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    async fn connect(&self, ip: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        self.connects.lock().unwrap().push((ip, port));
        self.open_ports.contains(&(ip, port))
    }
}
