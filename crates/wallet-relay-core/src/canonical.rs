//! Canonical event serialization for deterministic identifiers.
//!
//! An event id is the SHA-256 digest of the UTF-8 JSON array
//!
//! ```text
//! [0, <pubkey hex>, <created_at>, <kind>, <tags>, <content>]
//! ```
//!
//! with no whitespace between tokens. `serde_json` produces exactly this
//! compact form, and its string escaping (`\"`, `\\`, `\n`, `\r`, `\t`, `\b`,
//! `\f`, `\u00XX` for other control characters) matches the protocol rules.

use sha2::{Digest, Sha256};

use crate::crypto::PublicKey;
use crate::error::CoreError;
use crate::types::EventId;

/// Leading marker of the serialized array. Reserved by the protocol.
const SERIALIZATION_VERSION: u8 = 0;

/// Encode the signed fields of an event into canonical JSON bytes.
pub fn canonical_json(
    pubkey: &PublicKey,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<Vec<u8>, CoreError> {
    let fields = (
        SERIALIZATION_VERSION,
        pubkey.to_hex(),
        created_at,
        kind,
        tags,
        content,
    );
    serde_json::to_vec(&fields).map_err(|e| CoreError::EncodingError(e.to_string()))
}

/// Compute the event id for a set of signed fields.
pub fn compute_event_id(
    pubkey: &PublicKey,
    created_at: u64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<EventId, CoreError> {
    let bytes = canonical_json(pubkey, created_at, kind, tags, content)?;
    Ok(EventId(Sha256::digest(&bytes).into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> PublicKey {
        PublicKey::from_bytes([0x11; 32])
    }

    #[test]
    fn test_canonical_json_layout() {
        let tags = vec![vec!["d".to_string(), "x".to_string()]];
        let bytes = canonical_json(&key(), 100, 7375, &tags, "a").unwrap();
        let expected = format!("[0,\"{}\",100,7375,[[\"d\",\"x\"]],\"a\"]", "11".repeat(32));
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_canonical_json_escapes_content() {
        let bytes = canonical_json(&key(), 1, 1, &[], "line\n\"quoted\"\\\t").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with(r#",[],"line\n\"quoted\"\\\t"]"#));
    }

    #[test]
    fn test_canonical_json_keeps_unicode_verbatim() {
        let bytes = canonical_json(&key(), 1, 1, &[], "ünïcödé ⚡").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("ünïcödé ⚡"));
    }

    #[test]
    fn test_event_id_is_deterministic() {
        let tags = vec![vec!["p".to_string(), "ab".to_string()]];
        let a = compute_event_id(&key(), 42, 3, &tags, "hello").unwrap();
        let b = compute_event_id(&key(), 42, 3, &tags, "hello").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_event_id_depends_on_every_field() {
        let base = compute_event_id(&key(), 42, 3, &[], "hello").unwrap();
        assert_ne!(base, compute_event_id(&key(), 43, 3, &[], "hello").unwrap());
        assert_ne!(base, compute_event_id(&key(), 42, 4, &[], "hello").unwrap());
        assert_ne!(base, compute_event_id(&key(), 42, 3, &[], "hellO").unwrap());
        assert_ne!(
            base,
            compute_event_id(&PublicKey::from_bytes([0x12; 32]), 42, 3, &[], "hello").unwrap()
        );
        assert_ne!(
            base,
            compute_event_id(&key(), 42, 3, &[vec!["t".to_string()]], "hello").unwrap()
        );
    }
}
