//! Test fixtures and helpers.
//!
//! Common setup code for integration tests. Everything here panics on
//! failure; it is only used from tests.

use tempfile::TempDir;
use wallet_relay_core::{Event, EventBuilder, EventId, Keypair, PublicKey, KIND_DELETION};
use wallet_relay_store::{SqliteStore, StoreConfig};

/// A signing identity for tests.
pub struct TestFixture {
    pub keypair: Keypair,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Create with a deterministic keypair. `seed` must be non-zero.
    pub fn with_seed(seed: u8) -> Self {
        Self {
            keypair: Keypair::from_seed(&[seed; 32]).expect("non-zero seed is a valid key"),
        }
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Sign an event built from `builder`.
    pub fn sign(&self, builder: EventBuilder) -> Event {
        builder.sign(&self.keypair).expect("event serializes")
    }

    /// A signed event with no tags or content.
    pub fn event(&self, kind: u16, created_at: u64) -> Event {
        self.sign(EventBuilder::new(kind).created_at(created_at))
    }

    /// A signed event with content.
    pub fn event_with_content(&self, kind: u16, created_at: u64, content: &str) -> Event {
        self.sign(EventBuilder::new(kind).created_at(created_at).content(content))
    }

    /// A signed event carrying a `d` tag.
    pub fn parameterized(&self, kind: u16, d: &str, created_at: u64, content: &str) -> Event {
        self.sign(
            EventBuilder::new(kind)
                .created_at(created_at)
                .parameter(d)
                .content(content),
        )
    }

    /// A deletion request for the given events.
    pub fn delete_events(&self, created_at: u64, targets: &[EventId]) -> Event {
        let builder = targets.iter().fold(
            EventBuilder::new(KIND_DELETION).created_at(created_at),
            |builder, id| builder.tag(["e".to_string(), id.to_hex()]),
        );
        self.sign(builder)
    }

    /// A deletion request for a replaceable slot of this author.
    pub fn delete_address(&self, created_at: u64, kind: u16, d: &str) -> Event {
        let address = format!("{}:{}:{}", kind, self.public_key().to_hex(), d);
        self.sign(
            EventBuilder::new(KIND_DELETION)
                .created_at(created_at)
                .tag(["a".to_string(), address]),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create fixtures for `count` distinct authors.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count).map(|_| TestFixture::new()).collect()
}

/// Flip one bit of the signature.
pub fn tamper_signature(event: &Event) -> Event {
    let mut tampered = event.clone();
    tampered.sig.0[17] ^= 0x01;
    tampered
}

/// Change the content without re-signing.
pub fn tamper_content(event: &Event) -> Event {
    let mut tampered = event.clone();
    tampered.content.push('x');
    tampered
}

/// Open a SQLite store in a fresh temporary directory.
///
/// Keep the returned directory alive as long as the store.
pub fn temp_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteStore::open(&StoreConfig::new(dir.path())).expect("open store");
    (dir, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_relay_core::{verify_event, EventClass};

    #[test]
    fn test_fixture_events_verify() {
        let fixture = TestFixture::with_seed(1);
        let event = fixture.parameterized(7375, "mint", 10, "proofs");
        assert!(verify_event(&event));
        assert_eq!(event.class(), EventClass::Parameterized("mint".into()));
        assert!(!verify_event(&tamper_signature(&event)));
        assert!(!verify_event(&tamper_content(&event)));
    }

    #[test]
    fn test_deletion_fixtures() {
        let fixture = TestFixture::with_seed(2);
        let target = fixture.event(7376, 1);
        let deletion = fixture.delete_events(2, &[target.id]);
        assert_eq!(deletion.deletion_targets(), vec![target.id]);

        let by_address = fixture.delete_address(3, 7375, "mint");
        let addresses = by_address.deletion_addresses();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].pubkey, fixture.public_key());
    }

    #[test]
    fn test_multi_party_distinct() {
        let parties = multi_party_fixtures(3);
        assert_ne!(parties[0].public_key(), parties[1].public_key());
        assert_ne!(parties[1].public_key(), parties[2].public_key());
    }
}
