//! Device classification: vendor from the hardware address prefix and
//! router likelihood from the default gateway and a short TCP port check.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lanwatch_core::{Device, Role};

use crate::probe::NetProbe;

/// Vendor reported when the prefix table has no entry.
pub const UNKNOWN_VENDOR: &str = "UNKNOWN";

/// Ports tried, in order, when deciding whether a reachable host routes.
pub const ROUTER_PORTS: [u16; 3] = [80, 443, 23];

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(1);
const PORT_TIMEOUT: Duration = Duration::from_millis(500);

/// Hardware address prefix to vendor name, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct VendorTable {
    prefixes: HashMap<String, String>,
}

impl VendorTable {
    /// Parse `<6 hex digits><whitespace><vendor>` lines.
    ///
    /// A parenthesized annotation before the vendor name, as in
    /// `00000C     (base 16)    Cisco Systems, Inc`, is dropped. The first
    /// entry for a prefix wins.
    pub fn parse(text: &str) -> Self {
        let mut prefixes = HashMap::new();
        for line in text.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((hex, rest)) = line.trim().split_once(char::is_whitespace) else {
                continue;
            };
            if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                continue;
            }
            let vendor = match rest.split_once(')') {
                Some((_, name)) => name.trim(),
                None => rest.trim(),
            };
            if vendor.is_empty() {
                continue;
            }
            let hex = hex.to_ascii_uppercase();
            let prefix = format!("{}:{}:{}", &hex[0..2], &hex[2..4], &hex[4..6]);
            prefixes.entry(prefix).or_insert_with(|| vendor.to_string());
        }
        Self { prefixes }
    }

    /// Load the table from a file. A missing file yields an empty table.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => {
                let table = Self::parse(&String::from_utf8_lossy(&bytes));
                tracing::info!(
                    path = %path.display(),
                    prefixes = table.len(),
                    "Loaded vendor prefixes"
                );
                table
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not open vendor prefix table"
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Vendor for a hardware address, or [`UNKNOWN_VENDOR`].
    pub fn lookup(&self, mac: &str) -> &str {
        normalize_prefix(mac)
            .and_then(|prefix| self.prefixes.get(&prefix))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_VENDOR)
    }
}

/// Uppercase, colon-separated first three octets of a hardware address.
/// Accepts `:` or `-` separators.
pub fn normalize_prefix(mac: &str) -> Option<String> {
    if mac.len() < 8 || mac.starts_with("??") {
        return None;
    }
    let upper = mac.replace('-', ":").to_ascii_uppercase();
    let octets: Vec<&str> = upper.split(':').take(3).collect();
    if octets.len() < 3 || octets.iter().any(|o| o.is_empty() || o.len() > 2) {
        return None;
    }
    Some(format!("{:0>2}:{:0>2}:{:0>2}", octets[0], octets[1], octets[2]))
}

/// Vendor and role of a device at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub vendor: String,
    pub role: Role,
}

/// Enriches devices with vendor and router likelihood.
///
/// Router likelihood is recomputed on every call, so the same device may be
/// classified differently by successive writes within one cycle.
pub struct Classifier<P> {
    vendors: VendorTable,
    probe: Arc<P>,
}

impl<P: NetProbe> Classifier<P> {
    pub fn new(vendors: VendorTable, probe: Arc<P>) -> Self {
        Self { vendors, probe }
    }

    pub fn vendor(&self, mac: &str) -> &str {
        self.vendors.lookup(mac)
    }

    /// The default gateway is a router. Otherwise a reachable host that
    /// accepts a connection on one of [`ROUTER_PORTS`] is.
    pub async fn is_router(&self, ip: Ipv4Addr) -> bool {
        if self.probe.default_gateway().await == Some(ip) {
            return true;
        }
        if !self.probe.probe(ip, REACHABILITY_TIMEOUT).await.is_reachable() {
            return false;
        }
        for port in ROUTER_PORTS {
            if self.probe.connect(ip, port, PORT_TIMEOUT).await {
                tracing::debug!(ip = %ip, port, "Router port answered");
                return true;
            }
        }
        false
    }

    pub async fn classify(&self, device: &Device) -> Classification {
        Classification {
            vendor: self.vendor(&device.mac).to_string(),
            role: Role::from_router_flag(self.is_router(device.ip).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeProbe;

    const OUI: &str = "\
# vendor prefixes
00000C     (base 16)\t\tCisco Systems, Inc
a42bb0     TP-LINK TECHNOLOGIES CO.,LTD.
A42BB0     Duplicate Entry
3C22FB\t(base 16)\tApple, Inc.
00-00-0C   (hex)\t\tCisco Systems, Inc
ZZZZZZ     Not Hex
ABCDEF
";

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, last)
    }

    #[test]
    fn test_vendor_table_parse() {
        let table = VendorTable::parse(OUI);
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("00:00:0c:12:34:56"), "Cisco Systems, Inc");
        assert_eq!(table.lookup("A4-2B-B0-01-02-03"), "TP-LINK TECHNOLOGIES CO.,LTD.");
        assert_eq!(table.lookup("3c:22:fb:9a:10:01"), "Apple, Inc.");
    }

    #[test]
    fn test_vendor_lookup_misses() {
        let table = VendorTable::parse(OUI);
        assert_eq!(table.lookup("??:??:??:??:??:??"), UNKNOWN_VENDOR);
        assert_eq!(table.lookup("de:ad:be:ef:00:01"), UNKNOWN_VENDOR);
        assert_eq!(table.lookup("a4:2b"), UNKNOWN_VENDOR);
        assert_eq!(table.lookup(""), UNKNOWN_VENDOR);
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("a4:2b:b0:11:22:33").as_deref(), Some("A4:2B:B0"));
        assert_eq!(normalize_prefix("a4-2b-b0-11-22-33").as_deref(), Some("A4:2B:B0"));
        assert_eq!(normalize_prefix("a4:2:b0:11:22:33").as_deref(), Some("A4:02:B0"));
        assert_eq!(normalize_prefix("a42bb0112233"), None);
    }

    #[test]
    fn test_missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VendorTable::load(&dir.path().join("oui.txt")).is_empty());
    }

    #[tokio::test]
    async fn test_gateway_is_router_without_port_checks() {
        let probe = Arc::new(FakeProbe {
            gateway: Some(ip(1)),
            ..FakeProbe::default()
        });
        let classifier = Classifier::new(VendorTable::default(), Arc::clone(&probe));

        assert!(classifier.is_router(ip(1)).await);
        assert!(probe.probed().is_empty());
        assert!(probe.connects().is_empty());
    }

    #[tokio::test]
    async fn test_open_port_marks_router() {
        let mut fake = FakeProbe::with_hosts(&[(ip(254), None)]);
        fake.open_ports.insert((ip(254), 443));
        let probe = Arc::new(fake);
        let classifier = Classifier::new(VendorTable::default(), Arc::clone(&probe));

        assert!(classifier.is_router(ip(254)).await);
        assert_eq!(probe.connects(), vec![(ip(254), 80), (ip(254), 443)]);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_not_probed_for_ports() {
        let mut fake = FakeProbe::default();
        fake.open_ports.insert((ip(9), 80));
        let probe = Arc::new(fake);
        let classifier = Classifier::new(VendorTable::default(), Arc::clone(&probe));

        assert!(!classifier.is_router(ip(9)).await);
        assert!(probe.connects().is_empty());
    }

    #[tokio::test]
    async fn test_classify_plain_host() {
        let probe = Arc::new(FakeProbe::with_hosts(&[(ip(42), None)]));
        let classifier = Classifier::new(VendorTable::parse(OUI), Arc::clone(&probe));
        let device = Device::detected_now(ip(42), "3c:22:fb:9a:10:01");

        let c = classifier.classify(&device).await;
        assert_eq!(c.vendor, "Apple, Inc.");
        assert_eq!(c.role, Role::Host);
        assert_eq!(probe.connects().len(), ROUTER_PORTS.len());
    }
}
