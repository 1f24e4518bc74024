use thiserror::Error;

/// Errors raised while reading lanwatch file contracts.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Malformed device record: {0}")]
    MalformedRecord(String),

    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
