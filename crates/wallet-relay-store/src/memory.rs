//! In-memory event store.
//!
//! Mirrors [`crate::SqliteStore`] rule for rule (replacement, deletion,
//! tombstones, scan order) without touching disk. Used by tests and by
//! relays that do not need to survive a restart.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::Bound;
use std::sync::RwLock;

use wallet_relay_core::{supersedes, Event, EventClass, EventId, PublicKey, KIND_DELETION};

use crate::error::Result;
use crate::scan::{cut_page, start_bound};
use crate::traits::{EventStore, IndexKey, PutOutcome, ScanEntry, ScanPosition, ScanRange};

type Index<K> = HashMap<K, BTreeSet<ScanPosition>>;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock;
/// the write lock doubles as the single-writer lock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Events indexed by id.
    events: HashMap<EventId, Event>,

    /// Replace key -> current occupant.
    replace_keys: HashMap<String, EventId>,

    /// Secondary indexes, each in scan order.
    by_created: BTreeSet<ScanPosition>,
    by_kind: Index<u16>,
    by_author: Index<PublicKey>,
    by_author_kind: Index<(PublicKey, u16)>,
    by_tag: Index<(String, String)>,

    /// (event id, author) pairs deleted by that author.
    deleted_events: HashSet<(EventId, PublicKey)>,

    /// Replace key -> timestamp up to which the slot is deleted.
    deleted_addresses: HashMap<String, u64>,
}

impl MemoryStoreInner {
    fn insert(&mut self, event: &Event, storage_key: Option<String>) {
        let pos = ScanPosition::new(event.created_at, event.id);
        self.by_created.insert(pos);
        self.by_kind.entry(event.kind).or_default().insert(pos);
        self.by_author.entry(event.pubkey).or_default().insert(pos);
        self.by_author_kind
            .entry((event.pubkey, event.kind))
            .or_default()
            .insert(pos);
        for (name, value) in event.indexed_tags() {
            self.by_tag
                .entry((name.to_string(), value.to_string()))
                .or_default()
                .insert(pos);
        }
        if let Some(key) = storage_key {
            self.replace_keys.insert(key, event.id);
        }
        self.events.insert(event.id, event.clone());
    }

    fn remove(&mut self, id: &EventId) -> Option<Event> {
        let event = self.events.remove(id)?;
        let pos = ScanPosition::new(event.created_at, event.id);

        self.by_created.remove(&pos);
        remove_from(&mut self.by_kind, &event.kind, &pos);
        remove_from(&mut self.by_author, &event.pubkey, &pos);
        remove_from(&mut self.by_author_kind, &(event.pubkey, event.kind), &pos);
        for (name, value) in event.indexed_tags() {
            remove_from(
                &mut self.by_tag,
                &(name.to_string(), value.to_string()),
                &pos,
            );
        }
        if let Some(key) = event.replace_key() {
            let key = key.to_storage_key();
            if self.replace_keys.get(&key) == Some(id) {
                self.replace_keys.remove(&key);
            }
        }
        Some(event)
    }

    fn is_tombstoned(&self, event: &Event, storage_key: Option<&str>) -> bool {
        if self.deleted_events.contains(&(event.id, event.pubkey)) {
            return true;
        }
        storage_key
            .and_then(|key| self.deleted_addresses.get(key))
            .is_some_and(|until| event.created_at <= *until)
    }

    fn apply_deletion(&mut self, deletion: &Event) -> Vec<EventId> {
        let mut removed = Vec::new();

        for target in deletion.deletion_targets() {
            if target == deletion.id {
                continue;
            }
            let honored = self
                .events
                .get(&target)
                .is_some_and(|e| e.pubkey == deletion.pubkey && e.kind != KIND_DELETION);
            if honored && self.remove(&target).is_some() {
                removed.push(target);
            }
            self.deleted_events.insert((target, deletion.pubkey));
        }

        for address in deletion.deletion_addresses() {
            if address.pubkey != deletion.pubkey {
                continue;
            }
            let key = address.to_storage_key();
            let occupant = self
                .replace_keys
                .get(&key)
                .and_then(|id| self.events.get(id))
                .filter(|e| e.created_at <= deletion.created_at)
                .map(|e| e.id);
            if let Some(id) = occupant {
                self.remove(&id);
                removed.push(id);
            }
            let until = self.deleted_addresses.entry(key).or_insert(0);
            *until = (*until).max(deletion.created_at);
        }

        removed
    }

    fn index(&self, key: &IndexKey) -> Option<&BTreeSet<ScanPosition>> {
        match key {
            IndexKey::Created => Some(&self.by_created),
            IndexKey::Kind(kind) => self.by_kind.get(kind),
            IndexKey::Author(pubkey) => self.by_author.get(pubkey),
            IndexKey::AuthorKind(pubkey, kind) => self.by_author_kind.get(&(*pubkey, *kind)),
            IndexKey::Tag(name, value) => self.by_tag.get(&(name.clone(), value.clone())),
        }
    }
}

fn remove_from<K: std::hash::Hash + Eq>(index: &mut Index<K>, key: &K, pos: &ScanPosition) {
    if let Some(set) = index.get_mut(key) {
        set.remove(pos);
        if set.is_empty() {
            index.remove(key);
        }
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for MemoryStore {
    fn put(&self, event: &Event) -> Result<PutOutcome> {
        if event.class() == EventClass::Ephemeral {
            return Ok(PutOutcome::Ephemeral);
        }
        let storage_key = event.replace_key().map(|key| key.to_storage_key());
        let mut inner = self.inner.write()?;

        if inner.events.contains_key(&event.id) {
            return Ok(PutOutcome::Duplicate);
        }
        if inner.is_tombstoned(event, storage_key.as_deref()) {
            return Ok(PutOutcome::Tombstoned);
        }

        let mut previous = None;
        if let Some(key) = &storage_key {
            let existing = inner
                .replace_keys
                .get(key)
                .and_then(|id| inner.events.get(id))
                .map(|e| (e.id, e.created_at));
            if let Some((existing, existing_at)) = existing {
                if !supersedes(event.created_at, &event.id, existing_at, &existing) {
                    return Ok(PutOutcome::Obsolete { newer: existing });
                }
                inner.remove(&existing);
                previous = Some(existing);
            }
        }

        inner.insert(event, storage_key);

        if event.is_deletion() {
            let removed = inner.apply_deletion(event);
            return Ok(PutOutcome::Deletion { removed });
        }

        Ok(match previous {
            Some(previous) => PutOutcome::Replaced { previous },
            None => PutOutcome::Stored,
        })
    }

    fn get(&self, id: &EventId) -> Result<Option<Event>> {
        let inner = self.inner.read()?;
        Ok(inner.events.get(id).cloned())
    }

    fn delete(&self, id: &EventId) -> Result<bool> {
        let mut inner = self.inner.write()?;
        Ok(inner.remove(id).is_some())
    }

    fn scan_page(
        &self,
        index: &IndexKey,
        range: &ScanRange,
        limit: usize,
    ) -> Result<Vec<ScanEntry>> {
        let inner = self.inner.read()?;
        let Some(set) = inner.index(index) else {
            return Ok(Vec::new());
        };
        let ordered = set.range((start_bound(range), Bound::Unbounded));
        Ok(cut_page(ordered, range, limit))
    }

    fn count_all(&self) -> Result<u64> {
        let inner = self.inner.read()?;
        Ok(inner.events.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_relay_core::{EventBuilder, Keypair};

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_seed(&[seed; 32]).unwrap()
    }

    #[test]
    fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let e = EventBuilder::new(7375)
            .created_at(10)
            .tag(["p", "alice"])
            .sign(&keypair(1))
            .unwrap();

        assert_eq!(store.put(&e).unwrap(), PutOutcome::Stored);
        assert_eq!(store.put(&e).unwrap(), PutOutcome::Duplicate);
        assert_eq!(store.get(&e.id).unwrap(), Some(e.clone()));

        let page = store
            .scan_page(
                &IndexKey::Tag("p".into(), "alice".into()),
                &ScanRange::all(),
                10,
            )
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_memory_store_delete_clears_indexes() {
        let store = MemoryStore::new();
        let kp = keypair(2);
        let e = EventBuilder::new(10019)
            .created_at(10)
            .tag(["p", "bob"])
            .sign(&kp)
            .unwrap();
        store.put(&e).unwrap();
        assert!(store.delete(&e.id).unwrap());

        let inner = store.inner.read().unwrap();
        assert!(inner.by_created.is_empty());
        assert!(inner.by_kind.is_empty());
        assert!(inner.by_author.is_empty());
        assert!(inner.by_author_kind.is_empty());
        assert!(inner.by_tag.is_empty());
        assert!(inner.replace_keys.is_empty());
    }

    #[test]
    fn test_memory_store_replacement() {
        let store = MemoryStore::new();
        let kp = keypair(3);
        let old = EventBuilder::new(38172)
            .created_at(1)
            .parameter("mint")
            .sign(&kp)
            .unwrap();
        let new = EventBuilder::new(38172)
            .created_at(2)
            .parameter("mint")
            .sign(&kp)
            .unwrap();

        store.put(&new).unwrap();
        assert_eq!(
            store.put(&old).unwrap(),
            PutOutcome::Obsolete { newer: new.id }
        );
        assert_eq!(store.count_all().unwrap(), 1);
    }

    #[test]
    fn test_memory_store_tombstone() {
        let store = MemoryStore::new();
        let kp = keypair(4);
        let target = EventBuilder::new(7376).created_at(1).sign(&kp).unwrap();
        store.put(&target).unwrap();

        let deletion = EventBuilder::new(KIND_DELETION)
            .created_at(2)
            .tag(["e".to_string(), target.id.to_hex()])
            .sign(&kp)
            .unwrap();
        store.put(&deletion).unwrap();

        assert!(store.get(&target.id).unwrap().is_none());
        assert_eq!(store.put(&target).unwrap(), PutOutcome::Tombstoned);
    }
}
