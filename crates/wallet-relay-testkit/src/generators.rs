//! Proptest generators for property-based testing.
//!
//! Values are drawn from small pools (few authors, few tag values, a
//! narrow time window) so that generated filters actually hit generated
//! events and replaceable slots collide often.

use std::collections::HashMap;

use proptest::prelude::*;

use wallet_relay_core::{Event, EventBuilder, Filter, Keypair, PublicKey, ReplaceKey};

/// Author seeds used by [`events`].
pub const AUTHOR_SEEDS: [u8; 4] = [1, 2, 3, 4];

/// Kinds used by [`events`]: regular, replaceable, parameterized.
pub const KINDS: [u16; 5] = [7375, 7376, 9321, 10019, 38172];

/// Values of the `p` tag.
pub const P_VALUES: [&str; 3] = ["alice", "bob", "carol"];

/// Values of the `d` tag.
pub const D_VALUES: [&str; 2] = ["mint-a", "mint-b"];

/// Upper bound of generated timestamps.
pub const MAX_CREATED_AT: u64 = 20;

fn author_key(seed: u8) -> Keypair {
    Keypair::from_seed(&[seed; 32]).expect("non-zero seed is a valid key")
}

/// Public keys of the author pool.
pub fn author_keys() -> Vec<PublicKey> {
    AUTHOR_SEEDS
        .iter()
        .map(|seed| author_key(*seed).public_key())
        .collect()
}

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>()
        .prop_filter_map("valid secret key", |seed| Keypair::from_seed(&seed).ok())
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub author: u8,
    pub kind: u16,
    pub created_at: u64,
    pub p_tags: Vec<&'static str>,
    pub d_tag: Option<&'static str>,
    pub content: String,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::sample::select(AUTHOR_SEEDS.to_vec()),
            prop::sample::select(KINDS.to_vec()),
            0..=MAX_CREATED_AT,
            prop::collection::vec(prop::sample::select(P_VALUES.to_vec()), 0..=2),
            prop::option::of(prop::sample::select(D_VALUES.to_vec())),
            "[a-z]{0,4}",
        )
            .prop_map(|(author, kind, created_at, p_tags, d_tag, content)| EventParams {
                author,
                kind,
                created_at,
                p_tags,
                d_tag,
                content,
            })
            .boxed()
    }
}

/// Build and sign an event from parameters.
pub fn event_from_params(params: &EventParams) -> Event {
    let mut builder = EventBuilder::new(params.kind)
        .created_at(params.created_at)
        .content(params.content.clone());
    for p in &params.p_tags {
        builder = builder.tag(["p", *p]);
    }
    if let Some(d) = params.d_tag {
        builder = builder.parameter(d);
    }
    builder
        .sign(&author_key(params.author))
        .expect("event serializes")
}

/// A batch of up to `max` events.
pub fn events(max: usize) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(any::<EventParams>(), 0..=max)
        .prop_map(|params| params.iter().map(event_from_params).collect())
}

/// A filter over the same pools as [`events`].
pub fn filter() -> impl Strategy<Value = Filter> {
    (
        prop::option::of(prop::sample::subsequence(AUTHOR_SEEDS.to_vec(), 1..=2)),
        prop::option::of(prop::sample::subsequence(KINDS.to_vec(), 1..=3)),
        prop::option::of(prop::sample::subsequence(P_VALUES.to_vec(), 1..=2)),
        prop::option::of(0..=MAX_CREATED_AT),
        prop::option::of(0..=MAX_CREATED_AT),
        prop::option::of(1usize..=12),
    )
        .prop_map(|(authors, kinds, p_tags, since, until, limit)| {
            let mut filter = Filter::new();
            if let Some(seeds) = authors {
                filter = filter.authors(seeds.into_iter().map(|s| author_key(s).public_key()));
            }
            if let Some(kinds) = kinds {
                filter = filter.kinds(kinds);
            }
            if let Some(values) = p_tags {
                filter = filter.tag('p', values);
            }
            // Keep the range well-formed.
            let (since, until) = match (since, until) {
                (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
                range => range,
            };
            filter.since = since;
            filter.until = until;
            filter.limit = limit;
            filter
        })
}

/// What a store should hold after putting `events` in order, with no
/// deletions involved: one copy of each regular event, and the winner of
/// each replaceable slot.
///
/// The winner is the greatest `created_at`, ties going to the lowest id,
/// whatever the arrival order.
pub fn surviving(events: &[Event]) -> Vec<Event> {
    let mut regular: HashMap<_, Event> = HashMap::new();
    let mut slots: HashMap<ReplaceKey, Event> = HashMap::new();

    for event in events {
        match event.replace_key() {
            None => {
                regular.entry(event.id).or_insert_with(|| event.clone());
            }
            Some(key) => {
                let wins = match slots.get(&key) {
                    None => true,
                    Some(current) => {
                        (event.created_at, std::cmp::Reverse(event.id))
                            > (current.created_at, std::cmp::Reverse(current.id))
                    }
                };
                if wins {
                    slots.insert(key, event.clone());
                }
            }
        }
    }

    regular.into_values().chain(slots.into_values()).collect()
}

/// Brute-force answer to `filter` over `stored`: every match, newest
/// first, ties by lowest id, truncated to the limit.
pub fn reference_query(stored: &[Event], filter: &Filter) -> Vec<Event> {
    let mut matches: Vec<Event> = stored
        .iter()
        .filter(|e| filter.matches(e))
        .cloned()
        .collect();
    matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    matches.dedup_by_key(|e| e.id);
    if let Some(limit) = filter.limit {
        matches.truncate(limit);
    }
    matches
}
