//! Storage traits and error types

use crate::state::QueueItem;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing resume state
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid resume filename: {0}")]
    InvalidFilename(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A place crawl queues are snapshotted to and restored from
pub trait StateStore: Send + Sync {
    /// Replaces the snapshot stored under `filename`
    ///
    /// Returns the path that was written.
    fn write(&self, items: &[QueueItem], filename: &str) -> StorageResult<PathBuf>;

    /// Loads the snapshot stored under `filename`
    ///
    /// A missing or unreadable snapshot yields an empty queue.
    fn load(&self, filename: &str) -> Vec<QueueItem>;
}
