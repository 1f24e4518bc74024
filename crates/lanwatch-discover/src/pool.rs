//! Probe worker pool.
//!
//! A fixed number of tokio tasks split the range by interleaved stride:
//! worker `i` of `W` visits `first + i`, `first + i + W`, ... up to `last`.
//! Each worker accumulates its own devices; results are merged only after
//! every worker has finished.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use lanwatch_core::types::UNKNOWN_MAC;
use lanwatch_core::{Device, DeviceSet};
use tokio::task::JoinSet;

use crate::probe::{NetProbe, ProbeOutcome};
use crate::range::HostRange;

/// One worker's share of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkAssignment {
    pub index: u32,
    pub stride: u32,
    pub first: Ipv4Addr,
    pub last: Ipv4Addr,
    pub timeout: Duration,
    /// Default gateway at the start of the sweep, for logging only.
    pub gateway: Option<Ipv4Addr>,
}

impl WorkAssignment {
    /// Addresses this worker visits, in order.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start = u64::from(u32::from(self.first)) + u64::from(self.index);
        let end = u64::from(u32::from(self.last));
        (start..=end)
            .step_by(self.stride.max(1) as usize)
            .map(|addr| Ipv4Addr::from(addr as u32))
    }
}

/// Split `range` across `workers` tasks. `workers` below 1 is treated as 1.
///
/// The stride is always the configured worker count, but only workers that
/// have at least one address get an assignment; see [`idle_workers`].
pub fn assignments(
    range: &HostRange,
    workers: usize,
    timeout: Duration,
    gateway: Option<Ipv4Addr>,
) -> Vec<WorkAssignment> {
    let stride = stride(workers);
    let active = u64::from(stride).min(range.len()) as u32;
    (0..active)
        .map(|index| WorkAssignment {
            index,
            stride,
            first: range.first,
            last: range.last,
            timeout,
            gateway,
        })
        .collect()
}

/// Workers whose stride share of `range` is empty.
pub fn idle_workers(range: &HostRange, workers: usize) -> u64 {
    u64::from(stride(workers)).saturating_sub(range.len())
}

fn stride(workers: usize) -> u32 {
    workers.clamp(1, u32::MAX as usize) as u32
}

/// What one worker produced.
#[derive(Debug, Default)]
struct WorkerOutput {
    index: u32,
    devices: Vec<Device>,
    probed: u64,
    unavailable: u64,
}

/// Merged outcome of a full sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub devices: DeviceSet,
    pub probed: u64,
    /// Probes that could not run at all.
    pub unavailable: u64,
}

/// Probe every address in `range` and return once all workers are done.
///
/// Dropping the returned future aborts the workers.
pub async fn sweep<P: NetProbe>(
    probe: Arc<P>,
    range: &HostRange,
    workers: usize,
    timeout: Duration,
) -> SweepReport {
    let gateway = probe.default_gateway().await;
    let assignments = assignments(range, workers, timeout, gateway);
    let idle = idle_workers(range, workers);
    if idle > 0 {
        tracing::debug!(idle, "More workers than addresses, idle workers not started");
    }

    let mut outputs = Vec::with_capacity(assignments.len());
    let mut tasks = JoinSet::new();
    for assignment in assignments {
        tasks.spawn(run_worker(Arc::clone(&probe), assignment));
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(output) => outputs.push(output),
            Err(e) => tracing::error!(error = %e, "Probe worker failed, its results are lost"),
        }
    }
    outputs.sort_by_key(|o| o.index);

    let mut report = SweepReport::default();
    for output in outputs {
        report.probed += output.probed;
        report.unavailable += output.unavailable;
        report.devices.extend(output.devices);
    }

    if report.unavailable > 0 {
        tracing::warn!(
            unavailable = report.unavailable,
            probed = report.probed,
            "Reachability probing unavailable, affected addresses treated as unreachable"
        );
    }

    report
}

async fn run_worker<P: NetProbe>(probe: Arc<P>, assignment: WorkAssignment) -> WorkerOutput {
    let mut output = WorkerOutput {
        index: assignment.index,
        ..WorkerOutput::default()
    };

    for ip in assignment.addresses() {
        tracing::debug!(worker = assignment.index, ip = %ip, "Probing");
        output.probed += 1;

        match probe.probe(ip, assignment.timeout).await {
            ProbeOutcome::Reachable => {
                let mac = probe
                    .hardware_address(ip)
                    .await
                    .unwrap_or_else(|| UNKNOWN_MAC.to_string());
                let device = Device::detected_now(ip, mac);
                if !device.has_known_mac() {
                    tracing::debug!(ip = %ip, "No neighbor entry for live host");
                }
                if assignment.gateway == Some(ip) {
                    tracing::info!(ip = %ip, "Default gateway is up");
                }
                output.devices.push(device);
            }
            ProbeOutcome::Unreachable => {}
            ProbeOutcome::Unavailable => output.unavailable += 1,
        }
    }

    output
}
