//! Per-device record grammar shared by the snapshot, history and changes files.
//!
//! Every device line has the shape
//!
//! ```text
//! <address> <hardwareAddress> <vendor> [<ROUTER|HOST>] <detectionTimestamp>
//! ```
//!
//! The vendor may contain spaces and the timestamp contains one, so parsers
//! anchor on the bracketed role token instead of counting fields. The history
//! header marker and this line shape are read by downstream consumers and
//! must not change.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{CoreError, Result};
use crate::types::{Device, Role, TIMESTAMP_FORMAT};

/// Literal prefix of every history cycle header. Consumers count these lines
/// to derive a monotonic run counter.
pub const SCAN_HEADER_MARKER: &str = "=== Scan em";

/// Literal prefix of every changes block header.
pub const CHANGES_HEADER_MARKER: &str = "=== Mudanças em";

/// A device line read back from a lanwatch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device: Device,
    pub vendor: String,
    pub role: Role,
}

/// Render one device line, without the trailing newline.
pub fn format_record(device: &Device, vendor: &str, role: Role) -> String {
    format!(
        "{} {} {} [{}] {}",
        device.ip,
        device.mac,
        vendor,
        role,
        device.detected_at_display()
    )
}

/// Header opening one history cycle block.
pub fn history_header(timestamp: &NaiveDateTime, live_count: usize) -> String {
    format!(
        "{SCAN_HEADER_MARKER} {} — {live_count} host(s) ativos ===",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Header opening one changes block.
pub fn changes_header(timestamp: &NaiveDateTime) -> String {
    format!(
        "{CHANGES_HEADER_MARKER} {} ===",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Parse one device line.
///
/// A leading `+ ` or `- ` change marker is tolerated so lines from the
/// changes file parse too. An unreadable timestamp yields
/// `detected_at: None` rather than an error.
pub fn parse_record(line: &str) -> Result<DeviceRecord> {
    let malformed = || CoreError::MalformedRecord(line.to_string());

    let body = line.trim();
    let body = body
        .strip_prefix("+ ")
        .or_else(|| body.strip_prefix("- "))
        .unwrap_or(body);

    let open = body.rfind(" [").ok_or_else(malformed)?;
    let close = open + body[open..].find(']').ok_or_else(malformed)?;
    let role = Role::parse(&body[open + 2..close]).ok_or_else(malformed)?;

    let head = &body[..open];
    let timestamp = body[close + 1..].trim();

    let mut fields = head.splitn(3, char::is_whitespace);
    let ip_str = fields.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
    let mac = fields.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
    let vendor = fields.next().unwrap_or("").trim();

    let ip: Ipv4Addr = ip_str
        .parse()
        .map_err(|_| CoreError::InvalidAddress(ip_str.to_string()))?;

    Ok(DeviceRecord {
        device: Device {
            ip,
            mac: mac.to_string(),
            detected_at: NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok(),
        },
        vendor: vendor.to_string(),
        role,
    })
}

/// Count history cycle headers in a reader.
pub fn count_scan_runs<R: BufRead>(reader: R) -> Result<usize> {
    let mut count = 0;
    for line in reader.lines() {
        if line?.starts_with(SCAN_HEADER_MARKER) {
            count += 1;
        }
    }
    Ok(count)
}

/// Count recorded cycles in a history file. A missing file counts as zero.
pub fn count_scan_runs_in(path: &Path) -> Result<usize> {
    match File::open(path) {
        Ok(file) => count_scan_runs(BufReader::new(file)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_MAC;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn sample_device() -> Device {
        Device {
            ip: Ipv4Addr::new(192, 168, 1, 1),
            mac: "a4:2b:b0:11:22:33".to_string(),
            detected_at: Some(ts("2025-03-01 12:30:05")),
        }
    }

    #[test]
    fn test_format_record() {
        let line = format_record(&sample_device(), "TP-LINK TECHNOLOGIES CO.,LTD.", Role::Router);
        assert_eq!(
            line,
            "192.168.1.1 a4:2b:b0:11:22:33 TP-LINK TECHNOLOGIES CO.,LTD. [ROUTER] 2025-03-01 12:30:05"
        );
    }

    #[test]
    fn test_parse_record_with_spaced_vendor() {
        let line = format_record(&sample_device(), "Some Vendor [EU] Inc", Role::Host);
        let record = parse_record(&line).unwrap();
        assert_eq!(record.device, sample_device());
        assert_eq!(record.vendor, "Some Vendor [EU] Inc");
        assert_eq!(record.role, Role::Host);
    }

    #[test]
    fn test_parse_change_line() {
        let line = format!("+ {}", format_record(&sample_device(), "UNKNOWN", Role::Host));
        let record = parse_record(&line).unwrap();
        assert_eq!(record.device.ip, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_parse_record_placeholder_timestamp() {
        let record = parse_record(&format!("10.0.0.9 {UNKNOWN_MAC} UNKNOWN [HOST] ??")).unwrap();
        assert_eq!(record.device.mac, UNKNOWN_MAC);
        assert_eq!(record.device.detected_at, None);
    }

    #[test]
    fn test_parse_record_rejects_garbage() {
        assert!(matches!(
            parse_record("not a record"),
            Err(CoreError::MalformedRecord(_))
        ));
        assert!(matches!(
            parse_record("300.1.1.1 aa:bb:cc:dd:ee:ff X [HOST] ??"),
            Err(CoreError::InvalidAddress(_))
        ));
        assert!(parse_record("10.0.0.1 aa:bb:cc:dd:ee:ff X [SWITCH] ??").is_err());
    }

    #[test]
    fn test_history_header_shape() {
        let header = history_header(&ts("2025-03-01 12:30:05"), 3);
        assert_eq!(header, "=== Scan em 2025-03-01 12:30:05 — 3 host(s) ativos ===");
        assert!(header.starts_with(SCAN_HEADER_MARKER));
        assert_eq!(
            changes_header(&ts("2025-03-01 12:30:05")),
            "=== Mudanças em 2025-03-01 12:30:05 ==="
        );
    }

    #[test]
    fn test_count_scan_runs() {
        let history = "=== Scan em 2025-03-01 12:00:00 — 1 host(s) ativos ===\n\
                       10.0.0.1 ??:??:??:??:??:?? UNKNOWN [HOST] 2025-03-01 12:00:00\n\
                       \n\
                       === Scan em 2025-03-01 12:01:00 — 0 host(s) ativos ===\n\
                       \n";
        assert_eq!(count_scan_runs(history.as_bytes()).unwrap(), 2);
    }

    #[test]
    fn test_count_scan_runs_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(count_scan_runs_in(&dir.path().join("absent.txt")).unwrap(), 0);
    }
}
