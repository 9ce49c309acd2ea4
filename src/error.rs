use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the simulation, storage and configuration layers.
#[derive(Debug, Error)]
pub enum RotorError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration stream ended strictly inside a record.
    #[error("truncated configuration record: {read} of {expected} site values")]
    TruncatedRecord { read: usize, expected: usize },

    #[error("invalid {field} byte {value:#04x} in configuration header")]
    InvalidHeader { field: &'static str, value: u8 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unknown algorithm '{0}', expected 'metropolis' or 'cluster'")]
    UnknownAlgorithm(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RotorError>;
