//! Query correctness against a brute-force model, on both engines.

use proptest::prelude::*;

use wallet_relay::core::Filter;
use wallet_relay::store::{query, EventStore, MemoryStore, SqliteStore};
use wallet_relay::{Event, Relay, RelayConfig};
use wallet_relay_testkit::fixtures::{temp_store, TestFixture};
use wallet_relay_testkit::generators::{author_keys, events, filter, reference_query, surviving};

fn put_all<S: EventStore>(store: &S, events: &[Event]) {
    for event in events {
        store.put(event).unwrap();
    }
}

fn check<S: EventStore>(store: &S, events: &[Event], filter: &Filter) -> Result<(), TestCaseError> {
    let expected = reference_query(&surviving(events), filter);
    let found = query::query(store, filter).unwrap();
    prop_assert_eq!(&found, &expected);

    let mut unlimited = filter.clone();
    unlimited.limit = None;
    let total = reference_query(&surviving(events), &unlimited).len() as u64;
    prop_assert_eq!(query::count(store, filter).unwrap(), total);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_memory_query_matches_model(events in events(40), filter in filter()) {
        let store = MemoryStore::new();
        put_all(&store, &events);
        check(&store, &events, &filter)?;
    }

    #[test]
    fn test_sqlite_query_matches_model(events in events(40), filter in filter()) {
        let store = SqliteStore::open_memory().unwrap();
        put_all(&store, &events);
        check(&store, &events, &filter)?;
    }

    #[test]
    fn test_engines_agree_in_any_order(events in events(30), filter in filter()) {
        let memory = MemoryStore::new();
        let sqlite = SqliteStore::open_memory().unwrap();
        put_all(&memory, &events);
        let reversed: Vec<Event> = events.iter().rev().cloned().collect();
        put_all(&sqlite, &reversed);

        prop_assert_eq!(
            query::query(&memory, &filter).unwrap(),
            query::query(&sqlite, &filter).unwrap()
        );
    }
}

#[tokio::test]
async fn test_relay_query_newest_first_with_limit() {
    let (_dir, store) = temp_store();
    let relay = Relay::new(store, &RelayConfig::default());
    let author = TestFixture::with_seed(1);

    for t in 1..=10 {
        relay.submit(author.event(7376, t)).await.unwrap();
    }

    let found = relay.query(Filter::new().kinds([7376]).limit(3)).await.unwrap();
    let times: Vec<u64> = found.iter().map(|e| e.created_at).collect();
    assert_eq!(times, vec![10, 9, 8]);

    let window = relay
        .query(Filter::new().since(3).until(5))
        .await
        .unwrap();
    let times: Vec<u64> = window.iter().map(|e| e.created_at).collect();
    assert_eq!(times, vec![5, 4, 3]);

    assert!(relay.query(Filter::new().limit(0)).await.unwrap().is_empty());
    assert!(relay
        .query(Filter::new().authors(Vec::new()))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_default_and_max_limits() {
    let config = RelayConfig {
        limits: wallet_relay::QueryLimits {
            default_limit: 4,
            max_limit: 6,
        },
        ..RelayConfig::default()
    };
    let relay = Relay::new(MemoryStore::new(), &config);
    let author = TestFixture::with_seed(2);
    for t in 0..10 {
        relay.submit(author.event(7376, t)).await.unwrap();
    }

    assert_eq!(relay.query(Filter::new()).await.unwrap().len(), 4);
    assert_eq!(relay.query(Filter::new().limit(100)).await.unwrap().len(), 6);
    assert_eq!(relay.count(Filter::new().limit(1)).await.unwrap(), 10);
}

#[tokio::test]
async fn test_tag_and_author_queries() {
    let relay = Relay::new(MemoryStore::new(), &RelayConfig::default());
    let keys = author_keys();
    let alice = TestFixture::with_seed(1);
    let bob = TestFixture::with_seed(2);
    assert_eq!(alice.public_key(), keys[0]);

    let zap = alice.sign(
        wallet_relay::EventBuilder::new(9321)
            .created_at(5)
            .tag(["p", "carol"]),
    );
    let other = bob.sign(
        wallet_relay::EventBuilder::new(9321)
            .created_at(6)
            .tag(["p", "dave"]),
    );
    relay.submit(zap.clone()).await.unwrap();
    relay.submit(other.clone()).await.unwrap();

    let by_tag = relay.query(Filter::new().tag('p', ["carol"])).await.unwrap();
    assert_eq!(by_tag, vec![zap.clone()]);

    let by_author = relay
        .query(Filter::new().authors([bob.public_key()]).kinds([9321]))
        .await
        .unwrap();
    assert_eq!(by_author, vec![other.clone()]);

    let by_ids = relay
        .query(Filter::new().ids([other.id, zap.id]))
        .await
        .unwrap();
    assert_eq!(by_ids, vec![other, zap]);
}
