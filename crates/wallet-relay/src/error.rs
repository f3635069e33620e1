//! Error types for the relay.

use wallet_relay_core::FilterError;
use wallet_relay_store::StoreError;
use thiserror::Error;

use crate::policy::Rejection;

/// Errors that can occur during relay operations.
///
/// Admission rejections of events are not errors; they come back as
/// [`crate::Submission::Rejected`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Writes are halted after repeated storage failures.
    #[error("writes halted after {failures} consecutive storage failures")]
    WritesHalted { failures: u32 },

    /// Filter is malformed.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Filter refused by policy.
    #[error("{}", .0.reason)]
    FilterRejected(Rejection),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RelayError {
    /// True for errors caused by the caller's input rather than the relay.
    pub fn is_client_error(&self) -> bool {
        match self {
            RelayError::InvalidFilter(_) | RelayError::FilterRejected(_) => true,
            RelayError::Store(e) => !e.is_storage_fault(),
            RelayError::WritesHalted { .. } | RelayError::Task(_) => false,
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
