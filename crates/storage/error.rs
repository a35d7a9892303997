use azimuth_common::types::{DiffDataError, PointFieldError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Custom(String),
    #[error("Failed to lock database for writing")]
    LockError,
    #[cfg(feature = "sql")]
    #[error("LibSQL error: {0}")]
    LibSQL(#[from] libsql::Error),
    #[error("unexpected type found while querying DB")]
    SQLInvalidTypeError,
    #[error("DB version mismatch: found {current}, engine supports {expected}")]
    VersionMismatch { current: u64, expected: u64 },
    #[error("No event at block {block_number} log index {log_index}")]
    EventNotFound { block_number: u64, log_index: u64 },
    #[error("Failed to convert index: {0}")]
    TryInto(#[from] std::num::TryFromIntError),
    #[error("Stored value is corrupt: {0}")]
    DecodeError(String),
    #[error(transparent)]
    PointField(#[from] PointFieldError),
    #[error(transparent)]
    DiffData(#[from] DiffDataError),
    #[error("Failed to write checkpoint: {0}")]
    Checkpoint(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
