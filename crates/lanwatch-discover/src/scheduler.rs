//! Scan loop scheduling.
//!
//! One orchestration loop drives cycles back to back:
//! scanning (probe pool) → reconciling (diff + persistence) → sleeping.
//! A cycle never overlaps the next. Cancellation abandons an in-progress
//! sweep or cuts a sleep short, but never interrupts reconciling, so every
//! started write completes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lanwatch_core::DeviceSet;
use tokio::sync::watch;
use uuid::Uuid;

use crate::classify::{Classifier, VendorTable};
use crate::config::DiscoverConfig;
use crate::diff;
use crate::persist::{self, RecordFiles};
use crate::pool;
use crate::probe::NetProbe;
use crate::range::HostRange;

/// Summary of one completed cycle.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub scan_id: Uuid,
    pub live: usize,
    pub added: usize,
    pub removed: usize,
    pub persisted: bool,
    pub duration: Duration,
}

/// Drives sweep cycles for one configured range.
pub struct ScanScheduler<P> {
    range: HostRange,
    workers: usize,
    probe_timeout: Duration,
    interval: Duration,
    files: RecordFiles,
    probe: Arc<P>,
    classifier: Classifier<P>,
    previous: DeviceSet,
}

impl<P: NetProbe> ScanScheduler<P> {
    pub fn new(
        config: &DiscoverConfig,
        range: HostRange,
        probe: Arc<P>,
        vendors: VendorTable,
    ) -> Self {
        Self {
            range,
            workers: config.threads.max(1),
            probe_timeout: Duration::from_secs(config.timeout_secs),
            interval: Duration::from_secs(config.interval_secs),
            files: RecordFiles::from(config),
            classifier: Classifier::new(vendors, Arc::clone(&probe)),
            probe,
            previous: DeviceSet::new(),
        }
    }

    /// Seed the device set the first cycle is diffed against.
    pub fn with_previous(mut self, previous: DeviceSet) -> Self {
        self.previous = previous;
        self
    }

    pub fn previous(&self) -> &DeviceSet {
        &self.previous
    }

    /// Scanning: probe the whole range and return the live set.
    pub async fn scan(&self) -> DeviceSet {
        let report = pool::sweep(
            Arc::clone(&self.probe),
            &self.range,
            self.workers,
            self.probe_timeout,
        )
        .await;
        tracing::debug!(probed = report.probed, live = report.devices.len(), "Sweep finished");
        report.devices
    }

    /// Reconciling: diff against the previous cycle, persist, and make the
    /// current set the new baseline.
    pub async fn reconcile(
        &mut self,
        scan_id: Uuid,
        current: DeviceSet,
        started: Instant,
    ) -> CycleSummary {
        let changes = diff::detect_changes(&self.previous, &current);
        if changes.is_empty() {
            tracing::info!(scan_id = %scan_id, "No changes detected");
        } else {
            tracing::info!(
                scan_id = %scan_id,
                added = changes.added.len(),
                removed = changes.removed.len(),
                "Changes detected"
            );
        }

        let outcome =
            persist::persist_cycle(&self.files, &self.classifier, &current, &changes).await;

        let summary = CycleSummary {
            scan_id,
            live: current.len(),
            added: changes.added.len(),
            removed: changes.removed.len(),
            persisted: outcome.all_ok(),
            duration: started.elapsed(),
        };
        self.previous = current;
        summary
    }

    /// One full cycle without cancellation.
    pub async fn run_cycle(&mut self) -> CycleSummary {
        let scan_id = Uuid::new_v4();
        let started = Instant::now();
        let current = self.scan().await;
        self.reconcile(scan_id, current, started).await
    }

    /// Run cycles until `shutdown` turns `true`. Returns the number of
    /// completed cycles.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut cycles = 0;
        tracing::info!(
            first = %self.range.first,
            last = %self.range.last,
            workers = self.workers,
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let scan_id = Uuid::new_v4();
            let started = Instant::now();
            tracing::info!(scan_id = %scan_id, hosts = self.range.len(), "Scan cycle started");

            let current = tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => {
                    tracing::info!(
                        scan_id = %scan_id,
                        "Interrupted while scanning, cycle abandoned"
                    );
                    break;
                }
                current = self.scan() => current,
            };

            let summary = self.reconcile(scan_id, current, started).await;
            cycles += 1;
            tracing::info!(
                scan_id = %summary.scan_id,
                live = summary.live,
                added = summary.added,
                removed = summary.removed,
                persisted = summary.persisted,
                duration_ms = summary.duration.as_millis(),
                "Scan cycle complete"
            );

            tracing::info!(interval_secs = self.interval.as_secs(), "Sleeping until next scan");
            tokio::select! {
                biased;
                _ = cancelled(&mut shutdown) => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(cycles, "Scheduler stopped");
        cycles
    }
}

/// Resolves once cancellation is requested. A dropped sender never cancels.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
