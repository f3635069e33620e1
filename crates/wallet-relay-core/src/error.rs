//! Error types for the wallet relay core.

use thiserror::Error;

use crate::types::EventId;

/// Core errors that can occur during key and event operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("encoding error: {0}")]
    EncodingError(String),
}

/// Validation errors for event structure and signatures.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("signature verification failed")]
    SignatureFailed,

    #[error("event id mismatch: stated {stated}, computed {computed}")]
    IdMismatch { stated: EventId, computed: EventId },

    #[error("created_at {0} is out of range")]
    TimestampOutOfRange(u64),

    #[error("structural error: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            CoreError::InvalidSecretKey => {
                ValidationError::StructuralError("invalid secret key".into())
            }
            CoreError::EncodingError(msg) => ValidationError::StructuralError(msg),
        }
    }
}

/// Errors raised when a filter cannot be evaluated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("since ({since}) is after until ({until})")]
    InvertedRange { since: u64, until: u64 },

    #[error("unsupported filter key: {0}")]
    UnsupportedKey(String),
}
