//! File persistence: history and changes appends, snapshot overwrite.
//!
//! Within a cycle the write order is fixed: history, then changes (only when
//! something changed), then snapshot. A failed write is logged and the
//! remaining writes still run.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Timelike};
use lanwatch_core::record::{self, changes_header, format_record, history_header};
use lanwatch_core::{Device, DeviceSet};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::classify::Classifier;
use crate::config::DiscoverConfig;
use crate::diff::ChangeSet;
use crate::error::Result;
use crate::probe::NetProbe;

/// The three files a sweep maintains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFiles {
    pub snapshot: PathBuf,
    pub history: PathBuf,
    pub changes: PathBuf,
}

impl From<&DiscoverConfig> for RecordFiles {
    fn from(config: &DiscoverConfig) -> Self {
        Self {
            snapshot: config.last_seen_file.clone(),
            history: config.history_file.clone(),
            changes: config.changes_file.clone(),
        }
    }
}

/// Which writes of a cycle succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub history: bool,
    /// `None` when there was nothing to record.
    pub changes: Option<bool>,
    pub snapshot: bool,
}

impl PersistOutcome {
    pub fn all_ok(&self) -> bool {
        self.history && self.changes.unwrap_or(true) && self.snapshot
    }
}

/// Persist one cycle in the fixed order.
pub async fn persist_cycle<P: NetProbe>(
    files: &RecordFiles,
    classifier: &Classifier<P>,
    current: &DeviceSet,
    changes: &ChangeSet,
) -> PersistOutcome {
    let mut outcome = PersistOutcome::default();

    match append_history(&files.history, classifier, current, now()).await {
        Ok(()) => outcome.history = true,
        Err(e) => {
            tracing::error!(path = %files.history.display(), error = %e, "Failed to append history");
        }
    }

    if !changes.is_empty() {
        match append_changes(&files.changes, classifier, changes, now()).await {
            Ok(()) => outcome.changes = Some(true),
            Err(e) => {
                outcome.changes = Some(false);
                tracing::error!(
                    path = %files.changes.display(),
                    error = %e,
                    "Failed to append changes"
                );
            }
        }
    }

    match write_snapshot(&files.snapshot, classifier, current).await {
        Ok(()) => outcome.snapshot = true,
        Err(e) => {
            tracing::error!(path = %files.snapshot.display(), error = %e, "Failed to write snapshot");
        }
    }

    outcome
}

/// Append a cycle block: header, one line per live device, blank separator.
pub async fn append_history<P: NetProbe>(
    path: &Path,
    classifier: &Classifier<P>,
    devices: &DeviceSet,
    at: NaiveDateTime,
) -> Result<()> {
    let mut block = history_header(&at, devices.len());
    block.push('\n');
    render_devices(&mut block, classifier, devices.iter(), "").await;
    block.push('\n');
    append(path, &block).await
}

/// Append a changes block. Callers skip this when `changes` is empty.
pub async fn append_changes<P: NetProbe>(
    path: &Path,
    classifier: &Classifier<P>,
    changes: &ChangeSet,
    at: NaiveDateTime,
) -> Result<()> {
    let mut block = changes_header(&at);
    block.push('\n');
    if !changes.added.is_empty() {
        block.push_str(&format!("Added ({}):\n", changes.added.len()));
        render_devices(&mut block, classifier, changes.added.iter(), "+ ").await;
    }
    if !changes.removed.is_empty() {
        block.push_str(&format!("Removed ({}):\n", changes.removed.len()));
        render_devices(&mut block, classifier, changes.removed.iter(), "- ").await;
    }
    block.push('\n');
    append(path, &block).await
}

/// Replace the snapshot with the current live devices.
///
/// The new content goes to a sibling temporary file which is synced and
/// renamed over the snapshot, so readers never see a partial file.
pub async fn write_snapshot<P: NetProbe>(
    path: &Path,
    classifier: &Classifier<P>,
    devices: &DeviceSet,
) -> Result<()> {
    let mut body = String::new();
    render_devices(&mut body, classifier, devices.iter(), "").await;

    let tmp = temp_sibling(path);
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(body.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await?;

    tracing::debug!(path = %path.display(), devices = devices.len(), "Snapshot written");
    Ok(())
}

/// Read the snapshot back. A missing file is an empty set; unreadable lines
/// are skipped.
pub fn load_snapshot(path: &Path) -> Result<DeviceSet> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DeviceSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut devices = DeviceSet::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        match record::parse_record(line) {
            Ok(rec) => {
                devices.insert(rec.device);
            }
            Err(e) => tracing::debug!(error = %e, "Skipping snapshot line"),
        }
    }
    Ok(devices)
}

async fn render_devices<'a, P: NetProbe>(
    out: &mut String,
    classifier: &Classifier<P>,
    devices: impl Iterator<Item = &'a Device>,
    prefix: &str,
) {
    for device in devices {
        let c = classifier.classify(device).await;
        out.push_str(prefix);
        out.push_str(&format_record(device, &c.vendor, c.role));
        out.push('\n');
    }
}

async fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}
