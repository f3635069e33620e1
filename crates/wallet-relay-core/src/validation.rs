//! Event validation: identifier binding, signature verification and
//! structural checks.

use crate::error::ValidationError;
use crate::event::Event;

/// Largest accepted `created_at`, the range of a signed 64-bit timestamp.
pub const MAX_CREATED_AT: u64 = i64::MAX as u64;

/// Validate an event completely.
///
/// This performs:
/// - Timestamp range check
/// - Id recomputation against the stated id
/// - Schnorr signature verification against (id, pubkey)
pub fn validate_event(event: &Event) -> Result<(), ValidationError> {
    validate_event_structure(event)?;

    event
        .pubkey
        .verify(event.id.as_bytes(), &event.sig)
        .map_err(|_| ValidationError::SignatureFailed)
}

/// Validate everything except the signature.
///
/// Useful for events loaded from trusted storage.
pub fn validate_event_structure(event: &Event) -> Result<(), ValidationError> {
    if event.created_at > MAX_CREATED_AT {
        return Err(ValidationError::TimestampOutOfRange(event.created_at));
    }

    let computed = event.compute_id()?;
    if computed != event.id {
        return Err(ValidationError::IdMismatch {
            stated: event.id,
            computed,
        });
    }

    Ok(())
}

/// Boolean verdict on an event's authenticity. Never panics.
pub fn verify_event(event: &Event) -> bool {
    validate_event(event).is_ok()
}
