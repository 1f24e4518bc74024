//! lanwatch-discover: Periodic IPv4 sweep daemon.
//!
//! Computes the configured address range, probes every address with a fixed
//! worker pool, classifies live hosts, diffs them against the previous cycle
//! and records snapshot, history and changes files.

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod persist;
pub mod pool;
pub mod probe;
pub mod range;
pub mod scheduler;

#[cfg(test)]
mod test_support;
