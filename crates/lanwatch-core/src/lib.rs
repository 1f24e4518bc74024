//! lanwatch-core: Shared device model and file contracts for lanwatch.
//!
//! This crate provides the types every lanwatch component agrees on:
//! - `Device` and `DeviceSet`, the per-cycle view of live hosts
//! - `Role`, the router/host classification rendered into records
//! - The per-device record grammar used by the snapshot, history and
//!   changes files, plus the history run counter read by downstream consumers
//! - Common error types

pub mod error;
pub mod record;
pub mod types;

pub use error::CoreError;
pub use types::{Device, DeviceSet, Role};
