//! Query matcher: turns a filter into index scans.
//!
//! The planner picks the most selective index the filter allows, runs one
//! scan per value of the chosen set field, and merges the scans by scan
//! order (newest first, lowest id on ties). Every candidate is checked
//! against the whole filter, so the index choice only affects speed.
//! Merging stops as soon as the limit is reached.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use tracing::trace;

use wallet_relay_core::{Event, Filter};

use crate::error::Result;
use crate::scan::Scan;
use crate::traits::{EventStore, IndexKey, ScanPosition, ScanRange};

/// Author x kind products up to this size use the combined index.
pub const MAX_AUTHOR_KIND_SCANS: usize = 64;

/// Smallest page a scan fetches.
const MIN_PAGE_SIZE: usize = 16;

/// Largest page a scan fetches.
const MAX_PAGE_SIZE: usize = 256;

/// How a filter will be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// Nothing can match.
    Empty,
    /// Direct lookups by id.
    Ids,
    /// One scan per index key, merged.
    Scans(Vec<IndexKey>),
}

/// Choose an access path for `filter`.
///
/// Priority: ids, then one tag constraint, then authors (combined with
/// kinds when the product is small), then kinds, then a full time scan.
pub fn plan(filter: &Filter) -> QueryPlan {
    if filter.matches_nothing() {
        return QueryPlan::Empty;
    }
    if filter.ids.is_some() {
        return QueryPlan::Ids;
    }

    if let Some((name, values)) = filter.tag_constraints().next() {
        return QueryPlan::Scans(
            dedup(values)
                .into_iter()
                .map(|value| IndexKey::Tag(name.to_string(), value.clone()))
                .collect(),
        );
    }

    match (&filter.authors, &filter.kinds) {
        (Some(authors), Some(kinds))
            if authors.len() * kinds.len() <= MAX_AUTHOR_KIND_SCANS =>
        {
            let keys = dedup(authors)
                .into_iter()
                .flat_map(|author| {
                    dedup(kinds)
                        .into_iter()
                        .map(move |kind| IndexKey::AuthorKind(*author, *kind))
                })
                .collect();
            QueryPlan::Scans(keys)
        }
        (Some(authors), _) => QueryPlan::Scans(
            dedup(authors)
                .into_iter()
                .map(|author| IndexKey::Author(*author))
                .collect(),
        ),
        (None, Some(kinds)) => QueryPlan::Scans(
            dedup(kinds)
                .into_iter()
                .map(|kind| IndexKey::Kind(*kind))
                .collect(),
        ),
        (None, None) => QueryPlan::Scans(vec![IndexKey::Created]),
    }
}

/// Run `filter` against `store`.
///
/// Returns matching events newest first, without duplicates, truncated to
/// `filter.limit`. An unbounded filter returns every match.
pub fn query<S: EventStore>(store: &S, filter: &Filter) -> Result<Vec<Event>> {
    filter.validate()?;
    let limit = filter.limit.unwrap_or(usize::MAX);

    let plan = plan(filter);
    trace!(?plan, limit, "planned query");

    let mut events = match plan {
        QueryPlan::Empty => Vec::new(),
        QueryPlan::Ids => lookup_ids(store, filter)?,
        QueryPlan::Scans(keys) => {
            let mut events = Vec::new();
            let mut merge = Merge::new(store, keys, filter, limit)?;
            while events.len() < limit {
                match merge.next_match()? {
                    Some(event) => events.push(event),
                    None => break,
                }
            }
            events
        }
    };
    events.truncate(limit);
    Ok(events)
}

/// Count events matching `filter`, ignoring its limit.
pub fn count<S: EventStore>(store: &S, filter: &Filter) -> Result<u64> {
    filter.validate()?;
    let mut unlimited = filter.clone();
    unlimited.limit = None;

    match plan(&unlimited) {
        QueryPlan::Empty => Ok(0),
        QueryPlan::Ids => Ok(lookup_ids(store, &unlimited)?.len() as u64),
        QueryPlan::Scans(keys) => {
            let mut merge = Merge::new(store, keys, &unlimited, usize::MAX)?;
            let mut n = 0u64;
            while merge.next_match()?.is_some() {
                n += 1;
            }
            Ok(n)
        }
    }
}

fn lookup_ids<S: EventStore>(store: &S, filter: &Filter) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for id in dedup(filter.ids.as_deref().unwrap_or_default()) {
        if let Some(event) = store.get(id)? {
            if filter.matches(&event) {
                events.push(event);
            }
        }
    }
    events.sort_by_key(|e| ScanPosition::new(e.created_at, e.id));
    Ok(events)
}

/// K-way merge over index scans.
struct Merge<'a, S: EventStore> {
    store: &'a S,
    filter: &'a Filter,
    scans: Vec<Scan<'a, S>>,
    heads: BinaryHeap<Reverse<(ScanPosition, usize)>>,
    seen: HashSet<ScanPosition>,
}

impl<'a, S: EventStore> Merge<'a, S> {
    fn new(store: &'a S, keys: Vec<IndexKey>, filter: &'a Filter, limit: usize) -> Result<Self> {
        let range = ScanRange::between(filter.since, filter.until);
        let page_size = limit.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

        let mut merge = Self {
            store,
            filter,
            scans: keys
                .into_iter()
                .map(|key| store.scan(key, range).with_page_size(page_size))
                .collect(),
            heads: BinaryHeap::new(),
            seen: HashSet::new(),
        };
        for slot in 0..merge.scans.len() {
            merge.advance(slot)?;
        }
        Ok(merge)
    }

    fn advance(&mut self, slot: usize) -> Result<()> {
        if let Some(entry) = self.scans[slot].next() {
            self.heads.push(Reverse((entry?, slot)));
        }
        Ok(())
    }

    /// Next event in scan order that satisfies the whole filter.
    fn next_match(&mut self) -> Result<Option<Event>> {
        while let Some(Reverse((entry, slot))) = self.heads.pop() {
            self.advance(slot)?;
            if !self.seen.insert(entry) {
                continue;
            }
            // A concurrent delete may remove an event between scan and read.
            let Some(event) = self.store.get(entry.id())? else {
                continue;
            };
            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}

fn dedup<T: Eq + std::hash::Hash>(values: &[T]) -> Vec<&T> {
    let mut seen = HashSet::new();
    values.iter().filter(|v| seen.insert(*v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use wallet_relay_core::{EventBuilder, EventId, Keypair, PublicKey};

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_seed(&[seed; 32]).unwrap()
    }

    fn put(store: &MemoryStore, kp: &Keypair, kind: u16, created_at: u64, tags: &[[&str; 2]]) -> Event {
        let mut builder = EventBuilder::new(kind).created_at(created_at);
        for tag in tags {
            builder = builder.tag(*tag);
        }
        let event = builder.sign(kp).unwrap();
        store.put(&event).unwrap();
        event
    }

    #[test]
    fn test_plan_priority() {
        let pk = PublicKey::from_bytes([1; 32]);
        let by_ids = Filter::new().ids([EventId::ZERO]).authors([pk]).tag('p', ["x"]);
        assert_eq!(plan(&by_ids), QueryPlan::Ids);

        let by_tag = Filter::new().authors([pk]).tag('p', ["x", "y"]);
        assert_eq!(
            plan(&by_tag),
            QueryPlan::Scans(vec![
                IndexKey::Tag("p".into(), "x".into()),
                IndexKey::Tag("p".into(), "y".into()),
            ])
        );

        let by_author_kind = Filter::new().authors([pk]).kinds([7375, 7376]);
        assert_eq!(
            plan(&by_author_kind),
            QueryPlan::Scans(vec![
                IndexKey::AuthorKind(pk, 7375),
                IndexKey::AuthorKind(pk, 7376),
            ])
        );

        assert_eq!(
            plan(&Filter::new().kinds([9735, 9735])),
            QueryPlan::Scans(vec![IndexKey::Kind(9735)])
        );
        assert_eq!(
            plan(&Filter::new().since(5)),
            QueryPlan::Scans(vec![IndexKey::Created])
        );
        assert_eq!(plan(&Filter::new().authors([])), QueryPlan::Empty);
    }

    #[test]
    fn test_plan_falls_back_to_author_index_for_large_products() {
        let authors: Vec<PublicKey> = (0..10).map(|i| PublicKey::from_bytes([i; 32])).collect();
        let kinds: Vec<u16> = (0..10).collect();
        let filter = Filter::new().authors(authors).kinds(kinds);
        match plan(&filter) {
            QueryPlan::Scans(keys) => {
                assert_eq!(keys.len(), 10);
                assert!(keys.iter().all(|k| matches!(k, IndexKey::Author(_))));
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn test_query_merges_newest_first_with_limit() {
        let store = MemoryStore::new();
        let kp = keypair(1);
        put(&store, &kp, 7375, 10, &[]);
        put(&store, &kp, 7376, 30, &[]);
        put(&store, &kp, 7375, 20, &[]);
        put(&store, &kp, 9735, 40, &[]);

        let events = query(&store, &Filter::new().kinds([7375, 7376])).unwrap();
        let times: Vec<u64> = events.iter().map(|e| e.created_at).collect();
        assert_eq!(times, vec![30, 20, 10]);

        let events = query(&store, &Filter::new().kinds([7375, 7376]).limit(2)).unwrap();
        let times: Vec<u64> = events.iter().map(|e| e.created_at).collect();
        assert_eq!(times, vec![30, 20]);
    }

    #[test]
    fn test_query_dedups_across_tag_values() {
        let store = MemoryStore::new();
        let kp = keypair(2);
        let e = put(&store, &kp, 9321, 10, &[["p", "a"], ["p", "b"]]);

        let events = query(&store, &Filter::new().tag('p', ["a", "b"])).unwrap();
        assert_eq!(events, vec![e]);
    }

    #[test]
    fn test_query_applies_residual_conjuncts() {
        let store = MemoryStore::new();
        let alice = keypair(3);
        let bob = keypair(4);
        let wanted = put(&store, &alice, 9735, 10, &[["p", "x"]]);
        put(&store, &bob, 9735, 11, &[["p", "x"]]);
        put(&store, &alice, 9734, 12, &[["p", "x"]]);

        let filter = Filter::new()
            .tag('p', ["x"])
            .authors([alice.public_key()])
            .kinds([9735]);
        assert_eq!(query(&store, &filter).unwrap(), vec![wanted]);
    }

    #[test]
    fn test_query_time_bounds_and_ids() {
        let store = MemoryStore::new();
        let kp = keypair(5);
        let a = put(&store, &kp, 7375, 10, &[]);
        let b = put(&store, &kp, 7375, 20, &[]);

        let events = query(&store, &Filter::new().since(15)).unwrap();
        assert_eq!(events, vec![b.clone()]);

        let events = query(&store, &Filter::new().ids([a.id, b.id, a.id])).unwrap();
        assert_eq!(events, vec![b, a]);
    }

    #[test]
    fn test_query_rejects_inverted_range() {
        let store = MemoryStore::new();
        let err = query(&store, &Filter::new().since(10).until(5)).unwrap_err();
        assert!(!err.is_storage_fault());
    }

    #[test]
    fn test_query_no_match_is_empty() {
        let store = MemoryStore::new();
        put(&store, &keypair(6), 7375, 1, &[]);
        assert!(query(&store, &Filter::new().kinds([9735])).unwrap().is_empty());
        assert!(query(&store, &Filter::new().limit(0)).unwrap().is_empty());
    }

    #[test]
    fn test_count() {
        let store = MemoryStore::new();
        let kp = keypair(7);
        for t in 0..5 {
            put(&store, &kp, 7375, t, &[]);
        }
        put(&store, &kp, 9735, 3, &[]);
        assert_eq!(count(&store, &Filter::new().kinds([7375]).limit(2)).unwrap(), 5);
        assert_eq!(count(&store, &Filter::new()).unwrap(), 6);
        assert_eq!(count(&store, &Filter::new().kinds([])).unwrap(), 0);
    }
}
