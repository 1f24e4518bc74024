//! Error types for the lanwatch-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Prefix length {0} outside 0..=32")]
    InvalidPrefix(i64),

    #[error("Invalid network address: {0}")]
    InvalidNetwork(String),

    #[error("Host count {count} is zero or exceeds the limit of {limit}")]
    HostCount { count: u64, limit: u64 },

    #[error("No hosts in range {first}..{last}")]
    EmptyRange { first: String, last: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DiscoverError>;
