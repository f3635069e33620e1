//! Error types for the store module.

use thiserror::Error;

use wallet_relay_core::FilterError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Event serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The filter cannot be evaluated.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// A lock guarding engine state was poisoned by a panicking thread.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// True for faults of the engine itself, as opposed to a bad request.
    pub fn is_storage_fault(&self) -> bool {
        !matches!(self, StoreError::InvalidFilter(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        StoreError::LockPoisoned(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
