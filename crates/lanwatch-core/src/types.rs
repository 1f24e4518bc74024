//! Core domain types for a lanwatch sweep.
//!
//! A `Device` is created fresh each cycle at the moment its address answers a
//! probe and is never mutated afterwards. Vendor and role are derived on
//! demand and never stored here.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use chrono::{Local, NaiveDateTime, Timelike};

/// Hardware address recorded when the neighbor table has no entry.
pub const UNKNOWN_MAC: &str = "??:??:??:??:??:??";

/// Rendering of detection timestamps in every lanwatch file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Device ────────────────────────────────────────────────────────

/// A live host observed during one scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub ip: Ipv4Addr,
    /// Colon-separated hex, or [`UNKNOWN_MAC`].
    pub mac: String,
    /// When this cycle saw the address respond. `None` only for records
    /// restored from a file whose timestamp could not be read.
    pub detected_at: Option<NaiveDateTime>,
}

impl Device {
    /// A device detected right now, with the timestamp truncated to seconds.
    pub fn detected_now(ip: Ipv4Addr, mac: impl Into<String>) -> Self {
        let now = Local::now().naive_local();
        Self {
            ip,
            mac: mac.into(),
            detected_at: Some(now.with_nanosecond(0).unwrap_or(now)),
        }
    }

    pub fn has_known_mac(&self) -> bool {
        self.mac != UNKNOWN_MAC
    }

    /// The detection timestamp as written to disk (`??` when absent).
    pub fn detected_at_display(&self) -> String {
        match self.detected_at {
            Some(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
            None => "??".to_string(),
        }
    }
}

// ── Role ──────────────────────────────────────────────────────────

/// Router likelihood of a device, rendered as the bracketed record token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Router,
    Host,
}

impl Role {
    pub fn from_router_flag(is_router: bool) -> Self {
        if is_router {
            Self::Router
        } else {
            Self::Host
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Router => "ROUTER",
            Self::Host => "HOST",
        }
    }

    /// Parse a role token. The Portuguese `ROTEADOR` spelling written by
    /// older deployments is accepted as a router.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ROUTER" | "ROTEADOR" => Some(Self::Router),
            "HOST" => Some(Self::Host),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── DeviceSet ─────────────────────────────────────────────────────

/// Devices keyed by address, preserving the order they were inserted.
///
/// Address is the only identity: a second device with an address already in
/// the set is rejected, whatever its hardware address.
#[derive(Debug, Clone, Default)]
pub struct DeviceSet {
    devices: Vec<Device>,
    index: HashMap<Ipv4Addr, usize>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device. Returns `false` (and keeps the existing entry) when
    /// the address is already present.
    pub fn insert(&mut self, device: Device) -> bool {
        if self.index.contains_key(&device.ip) {
            return false;
        }
        self.index.insert(device.ip, self.devices.len());
        self.devices.push(device);
        true
    }

    pub fn contains(&self, ip: &Ipv4Addr) -> bool {
        self.index.contains_key(ip)
    }

    pub fn get(&self, ip: &Ipv4Addr) -> Option<&Device> {
        self.index.get(ip).map(|&i| &self.devices[i])
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }
}

impl FromIterator<Device> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        let mut set = DeviceSet::new();
        for device in iter {
            set.insert(device);
        }
        set
    }
}

impl Extend<Device> for DeviceSet {
    fn extend<I: IntoIterator<Item = Device>>(&mut self, iter: I) {
        for device in iter {
            self.insert(device);
        }
    }
}

impl<'a> IntoIterator for &'a DeviceSet {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl IntoIterator for DeviceSet {
    type Item = Device;
    type IntoIter = std::vec::IntoIter<Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}
