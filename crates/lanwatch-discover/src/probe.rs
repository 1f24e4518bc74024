//! Platform probing facilities behind a trait seam.
//!
//! `SystemProbe` shells out to the system `ping` via `tokio::process::Command`
//! and reads the Linux neighbor and routing tables from `/proc`. Every lookup
//! degrades to "unknown" or "unreachable" instead of failing.

use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;

/// Neighbor entries with this address have not been resolved yet.
const INCOMPLETE_MAC: &str = "00:00:00:00:00:00";

/// Result of one reachability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    /// The probing mechanism itself could not run. Treated as unreachable
    /// by callers, but reported so the degradation can be logged.
    Unavailable,
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// Network facilities used by the worker pool and classifier.
pub trait NetProbe: Send + Sync + 'static {
    /// Single reachability probe bounded by `timeout`. No retries.
    fn probe(&self, ip: Ipv4Addr, timeout: Duration)
        -> impl Future<Output = ProbeOutcome> + Send;

    /// Best-effort hardware address from the neighbor table.
    fn hardware_address(&self, ip: Ipv4Addr) -> impl Future<Output = Option<String>> + Send;

    /// The platform's current default gateway, if it can be determined.
    fn default_gateway(&self) -> impl Future<Output = Option<Ipv4Addr>> + Send;

    /// Whether a TCP connection to `ip:port` completes within `timeout`.
    fn connect(&self, ip: Ipv4Addr, port: u16, timeout: Duration)
        -> impl Future<Output = bool> + Send;
}

/// Linux implementation backed by `ping` and `/proc/net`.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    ping_path: String,
    arp_table: PathBuf,
    route_table: PathBuf,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            ping_path: "ping".to_string(),
            arp_table: PathBuf::from("/proc/net/arp"),
            route_table: PathBuf::from("/proc/net/route"),
        }
    }
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NetProbe for SystemProbe {
    async fn probe(&self, ip: Ipv4Addr, wait: Duration) -> ProbeOutcome {
        // ping's -W takes whole seconds.
        let secs = wait.as_secs().max(1);
        let status = Command::new(&self.ping_path)
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(secs.to_string())
            .arg(ip.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(Duration::from_secs(secs + 1), status).await {
            Ok(Ok(status)) => match status.code() {
                Some(0) => ProbeOutcome::Reachable,
                // 1 is "no reply"; other codes mean ping could not send at
                // all, e.g. no raw socket permission.
                Some(1) | None => ProbeOutcome::Unreachable,
                Some(code) => {
                    tracing::debug!(ip = %ip, code, "ping failed to run");
                    ProbeOutcome::Unavailable
                }
            },
            Ok(Err(e)) => {
                tracing::debug!(ip = %ip, error = %e, "Could not run ping");
                ProbeOutcome::Unavailable
            }
            Err(_) => ProbeOutcome::Unreachable,
        }
    }

    async fn hardware_address(&self, ip: Ipv4Addr) -> Option<String> {
        let table = tokio::fs::read_to_string(&self.arp_table).await.ok()?;
        lookup_neighbor(&table, ip)
    }

    async fn default_gateway(&self) -> Option<Ipv4Addr> {
        let table = tokio::fs::read_to_string(&self.route_table).await.ok()?;
        parse_default_gateway(&table)
    }

    async fn connect(&self, ip: Ipv4Addr, port: u16, wait: Duration) -> bool {
        matches!(timeout(wait, TcpStream::connect((ip, port))).await, Ok(Ok(_)))
    }
}

/// Find the hardware address of `ip` in `/proc/net/arp` content.
pub fn lookup_neighbor(table: &str, ip: Ipv4Addr) -> Option<String> {
    let wanted = ip.to_string();
    table
        .lines()
        .skip(1)
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|cols| cols.len() >= 4)
        .find(|cols| cols[0] == wanted)
        .map(|cols| cols[3])
        .filter(|mac| *mac != INCOMPLETE_MAC)
        .map(str::to_string)
}

/// Extract the default gateway from `/proc/net/route` content.
///
/// The gateway column is the address in network byte order printed as a
/// host-endian hex integer.
pub fn parse_default_gateway(table: &str) -> Option<Ipv4Addr> {
    for line in table.lines().skip(1) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 3 {
            continue;
        }
        let Ok(destination) = u32::from_str_radix(cols[1], 16) else {
            continue;
        };
        if destination != 0 {
            continue;
        }
        let Ok(gateway) = u32::from_str_radix(cols[2], 16) else {
            continue;
        };
        let gateway = Ipv4Addr::from(gateway.to_le_bytes());
        if !gateway.is_unspecified() {
            return Some(gateway);
        }
    }
    None
}
