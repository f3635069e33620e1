//! EventStore trait: the abstract interface for event persistence.
//!
//! This trait allows the admission pipeline to be storage-agnostic.
//! Implementations include SQLite (primary) and in-memory (for tests).

use std::cmp::Reverse;

use wallet_relay_core::{Event, EventId, PublicKey};

use crate::error::Result;
use crate::scan::Scan;

/// Result of putting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// Event was stored as a new record.
    Stored,
    /// Event was stored and superseded an older event for its replace key.
    Replaced {
        /// The event that was removed.
        previous: EventId,
    },
    /// A deletion request was stored and removed the listed events.
    Deletion {
        /// Events removed as a side effect.
        removed: Vec<EventId>,
    },
    /// The exact same event already exists (idempotent - not an error).
    Duplicate,
    /// A newer event already occupies the replace key. Nothing was written.
    Obsolete {
        /// The event that stays.
        newer: EventId,
    },
    /// The event was deleted by its author earlier. Nothing was written.
    Tombstoned,
    /// Ephemeral events are never persisted.
    Ephemeral,
}

impl PutOutcome {
    /// Whether the event is in the store after this call.
    pub fn is_stored(&self) -> bool {
        matches!(
            self,
            PutOutcome::Stored
                | PutOutcome::Replaced { .. }
                | PutOutcome::Deletion { .. }
                | PutOutcome::Duplicate
        )
    }
}

/// A secondary index and the value scanned within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    /// Every event, by timestamp.
    Created,
    /// (kind, timestamp).
    Kind(u16),
    /// (author, timestamp).
    Author(PublicKey),
    /// (author, kind, timestamp).
    AuthorKind(PublicKey, u16),
    /// (tag name, tag value, timestamp).
    Tag(String, String),
}

/// Position of an entry in scan order.
///
/// Scans run newest first; ties on timestamp go lowest id first. The
/// derived ordering of this type is exactly that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanPosition {
    created_at: Reverse<u64>,
    id: EventId,
}

impl ScanPosition {
    pub fn new(created_at: u64, id: EventId) -> Self {
        Self {
            created_at: Reverse(created_at),
            id,
        }
    }

    pub fn created_at(&self) -> u64 {
        self.created_at.0
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }
}

/// A reference to an event produced by a scan.
pub type ScanEntry = ScanPosition;

/// The part of an index a scan covers.
///
/// `since` and `until` bound timestamps inclusively. `after` resumes a
/// scan strictly past a previously returned entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanRange {
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub after: Option<ScanPosition>,
}

impl ScanRange {
    /// Full index range.
    pub fn all() -> Self {
        Self::default()
    }

    /// Inclusive timestamp bounds.
    pub fn between(since: Option<u64>, until: Option<u64>) -> Self {
        Self {
            since,
            until,
            after: None,
        }
    }

    /// The same range, resumed past `position`.
    pub fn resume_after(self, position: ScanPosition) -> Self {
        Self {
            after: Some(position),
            ..self
        }
    }

    /// Whether `position` lies inside this range.
    pub fn contains(&self, position: &ScanPosition) -> bool {
        let created_at = position.created_at();
        self.since.map_or(true, |since| created_at >= since)
            && self.until.map_or(true, |until| created_at <= until)
            && self.after.map_or(true, |after| *position > after)
    }
}

/// The EventStore trait: synchronous interface for event persistence.
///
/// Methods block on I/O. Async callers run them via `spawn_blocking`.
///
/// # Guarantees
///
/// - **Atomic put**: the replace check, removal of the superseded event,
///   insertion, index updates and deletion side effects commit together.
/// - **Single writer**: puts and deletes are serialized, so two events for
///   the same replace key can never both survive.
/// - **Short reads**: a scan reads one page per read operation and never
///   holds a read transaction between pages.
pub trait EventStore: Send + Sync + 'static {
    /// Persist an event, applying replacement and deletion rules.
    fn put(&self, event: &Event) -> Result<PutOutcome>;

    /// Get an event by id.
    fn get(&self, id: &EventId) -> Result<Option<Event>>;

    /// Remove an event and all its index entries. Returns false if absent.
    fn delete(&self, id: &EventId) -> Result<bool>;

    /// Read up to `limit` entries of `index` within `range`, in scan order.
    fn scan_page(&self, index: &IndexKey, range: &ScanRange, limit: usize)
        -> Result<Vec<ScanEntry>>;

    /// Number of stored events.
    fn count_all(&self) -> Result<u64>;

    /// Lazy, restartable, newest-first scan over one index range.
    fn scan(&self, index: IndexKey, range: ScanRange) -> Scan<'_, Self> {
        Scan::new(self, index, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_position_order_is_newest_first_then_lowest_id() {
        let low = EventId::from_bytes([0x01; 32]);
        let high = EventId::from_bytes([0x02; 32]);

        let mut positions = vec![
            ScanPosition::new(5, high),
            ScanPosition::new(9, high),
            ScanPosition::new(5, low),
        ];
        positions.sort();
        assert_eq!(
            positions,
            vec![
                ScanPosition::new(9, high),
                ScanPosition::new(5, low),
                ScanPosition::new(5, high),
            ]
        );
    }

    #[test]
    fn test_range_contains() {
        let id = EventId::from_bytes([0x05; 32]);
        let range = ScanRange::between(Some(10), Some(20));
        assert!(range.contains(&ScanPosition::new(10, id)));
        assert!(range.contains(&ScanPosition::new(20, id)));
        assert!(!range.contains(&ScanPosition::new(21, id)));

        let resumed = range.resume_after(ScanPosition::new(15, id));
        assert!(!resumed.contains(&ScanPosition::new(15, id)));
        assert!(!resumed.contains(&ScanPosition::new(16, id)));
        assert!(resumed.contains(&ScanPosition::new(14, id)));
        assert!(resumed.contains(&ScanPosition::new(15, EventId::MAX)));
    }

    #[test]
    fn test_put_outcome_is_stored() {
        assert!(PutOutcome::Stored.is_stored());
        assert!(PutOutcome::Duplicate.is_stored());
        assert!(!PutOutcome::Tombstoned.is_stored());
        assert!(!PutOutcome::Ephemeral.is_stored());
        assert!(!PutOutcome::Obsolete {
            newer: EventId::ZERO
        }
        .is_stored());
    }
}
