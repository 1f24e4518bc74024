//! Change detection between the previous and current live device sets.
//!
//! Identity is the address alone. A host that keeps its address but shows a
//! different hardware address is neither added nor removed.

use lanwatch_core::{Device, DeviceSet};

/// The outcome of diffing two cycles.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// In current, absent from previous; in current-set order.
    pub added: Vec<Device>,
    /// In previous, absent from current; in previous-set order.
    pub removed: Vec<Device>,
}

impl ChangeSet {
    /// Nothing changed this cycle.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn detect_changes(previous: &DeviceSet, current: &DeviceSet) -> ChangeSet {
    let added = current
        .iter()
        .filter(|d| !previous.contains(&d.ip))
        .cloned()
        .collect();
    let removed = previous
        .iter()
        .filter(|d| !current.contains(&d.ip))
        .cloned()
        .collect();
    ChangeSet { added, removed }
}
