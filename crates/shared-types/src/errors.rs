//! # Error Types
//!
//! Storage errors shared by every repository port.

use thiserror::Error;

/// Failure of the underlying storage engine.
///
/// Repositories propagate these untouched; retry policy belongs to the
/// caller's next natural cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Engine unreachable or timed out.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be decoded.
    #[error("Data corruption: {0}")]
    Corrupted(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl StorageError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Database(_))
    }
}
