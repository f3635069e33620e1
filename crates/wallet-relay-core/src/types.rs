//! Strong type definitions for the wallet relay.
//!
//! All identifiers are newtypes to prevent misuse at compile time. On the
//! wire they travel as lowercase hex strings.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 32-byte event identifier, computed as SHA-256(canonical serialization).
///
/// Byte order and lowercase-hex order agree, so the derived `Ord` is the
/// lexicographic id order used to break timestamp ties.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub [u8; 32]);

impl EventId {
    /// Create a new EventId from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        decode_fixed::<32>(s).map(Self)
    }

    /// The zero event ID (used as a sentinel).
    pub const ZERO: Self = Self([0u8; 32]);

    /// The largest possible event ID (upper bound for range scans).
    pub const MAX: Self = Self([0xffu8; 32]);
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for EventId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for EventId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for EventId {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Decode a hex string into a fixed-size byte array.
///
/// Any length other than exactly `N` bytes is an error.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], hex::FromHexError> {
    let mut arr = [0u8; N];
    if s.len() != N * 2 {
        return Err(hex::FromHexError::InvalidStringLength);
    }
    hex::decode_to_slice(s, &mut arr)?;
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_hex_roundtrip() {
        let id = EventId::from_bytes([0x42; 32]);
        let hex = id.to_hex();
        let recovered = EventId::from_hex(&hex).unwrap();
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_event_id_rejects_wrong_length() {
        assert!(EventId::from_hex("abcd").is_err());
        assert!(EventId::from_hex(&"ab".repeat(33)).is_err());
    }

    #[test]
    fn test_event_id_order_matches_hex_order() {
        let low = EventId::from_hex(&format!("0a{}", "ff".repeat(31))).unwrap();
        let high = EventId::from_hex(&format!("a0{}", "00".repeat(31))).unwrap();
        assert!(low < high);
        assert!(low.to_hex() < high.to_hex());
    }

    #[test]
    fn test_event_id_json_is_hex_string() {
        let id = EventId::from_bytes([0xab; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(32)));
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_event_id_debug() {
        let id = EventId::from_bytes([0xcd; 32]);
        let debug = format!("{:?}", id);
        assert!(debug.starts_with("EventId("));
    }
}
