//! The Relay: admission pipeline in front of the event store.
//!
//! Events pass the kind policy, then id and signature verification, then
//! go to storage. Filters pass the same policy and are answered by the
//! query matcher. Storage is synchronous and runs on the blocking pool.

use std::sync::Arc;

use tokio::task;
use tracing::{debug, error, info};
use wallet_relay_core::{validate_event, Event, EventClass, EventId, Filter};
use wallet_relay_store::{query, EventStore, PutOutcome, SqliteStore};

use crate::breaker::WriteBreaker;
use crate::config::{QueryLimits, RelayConfig, RelayInfo};
use crate::error::{RelayError, Result};
use crate::policy::{KindPolicy, Rejection};
use crate::subscription::{Hub, Subscription};

/// Result of submitting an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The event passed admission. `outcome` says what storage did with it.
    Accepted { id: EventId, outcome: PutOutcome },
    /// The event was turned away.
    Rejected(Rejection),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted { .. })
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Submission::Rejected(rejection) => Some(rejection),
            Submission::Accepted { .. } => None,
        }
    }
}

/// The relay core.
///
/// Owns no global state: the store and the policy are handed in, and
/// several relays can share either.
pub struct Relay<S: EventStore> {
    /// The storage backend.
    store: Arc<S>,
    /// Allowed kinds.
    policy: Arc<KindPolicy>,
    limits: QueryLimits,
    breaker: WriteBreaker,
    hub: Hub,
    info: RelayInfo,
}

impl Relay<SqliteStore> {
    /// Open the SQLite store named by `config` and build a relay on it.
    pub fn open(config: &RelayConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.store)?;
        info!(
            path = %config.store.path.display(),
            map_size = config.store.map_size,
            kinds = config.allowed_kinds.len(),
            "relay storage opened"
        );
        Ok(Self::new(store, config))
    }
}

impl<S: EventStore> Relay<S> {
    /// Create a relay with the policy described by `config`.
    pub fn new(store: S, config: &RelayConfig) -> Self {
        Self::with_policy(Arc::new(store), Arc::new(config.policy()), config)
    }

    /// Create a relay from shared parts. `config.allowed_kinds` is ignored
    /// in favour of `policy`.
    pub fn with_policy(store: Arc<S>, policy: Arc<KindPolicy>, config: &RelayConfig) -> Self {
        Self {
            store,
            policy,
            limits: config.limits,
            breaker: WriteBreaker::new(config.max_storage_failures),
            hub: Hub::new(config.subscription_buffer),
            info: config.info.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &KindPolicy {
        &self.policy
    }

    pub fn info(&self) -> &RelayInfo {
        &self.info
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Admission
    // ─────────────────────────────────────────────────────────────────────────

    /// Admit an event.
    ///
    /// Rejections come back as [`Submission::Rejected`]. An `Err` means
    /// the relay itself failed: storage errors and halted writes.
    pub async fn submit(&self, event: Event) -> Result<Submission> {
        let id = event.id;

        if let Err(rejection) = self.policy.admit_event(&event) {
            debug!(%id, kind = event.kind, "event rejected by policy");
            return Ok(Submission::Rejected(rejection));
        }

        if let Err(e) = validate_event(&event) {
            debug!(%id, error = %e, "event failed verification");
            return Ok(Submission::Rejected(Rejection::invalid_signature()));
        }

        if event.class() == EventClass::Ephemeral {
            debug!(%id, kind = event.kind, "ephemeral event broadcast");
            self.hub.publish(event);
            return Ok(Submission::Accepted {
                id,
                outcome: PutOutcome::Ephemeral,
            });
        }

        if self.breaker.is_halted() {
            return Err(RelayError::WritesHalted {
                failures: self.breaker.consecutive_failures(),
            });
        }

        let outcome = self.put(event.clone()).await?;

        match outcome {
            PutOutcome::Tombstoned => {
                debug!(%id, "event was deleted by its author");
                Ok(Submission::Rejected(Rejection::deleted()))
            }
            outcome => {
                match &outcome {
                    PutOutcome::Stored => {
                        debug!(%id, kind = event.kind, "event stored");
                    }
                    PutOutcome::Replaced { previous } => {
                        debug!(%id, %previous, kind = event.kind, "event replaced older version");
                    }
                    PutOutcome::Deletion { removed } => {
                        info!(%id, removed = removed.len(), "deletion applied");
                    }
                    _ => {
                        debug!(%id, ?outcome, "event not written");
                    }
                }
                if matches!(
                    outcome,
                    PutOutcome::Stored | PutOutcome::Replaced { .. } | PutOutcome::Deletion { .. }
                ) {
                    self.hub.publish(event);
                }
                Ok(Submission::Accepted { id, outcome })
            }
        }
    }

    async fn put(&self, event: Event) -> Result<PutOutcome> {
        let store = Arc::clone(&self.store);
        let result = task::spawn_blocking(move || store.put(&event)).await;

        match result {
            Ok(Ok(outcome)) => {
                self.breaker.record_success();
                Ok(outcome)
            }
            Ok(Err(e)) => {
                error!(error = %e, "storage write failed");
                self.breaker.record_failure();
                Err(e.into())
            }
            Err(e) => {
                error!(error = %e, "storage write task failed");
                self.breaker.record_failure();
                Err(e.into())
            }
        }
    }

    /// True while writes are halted.
    pub fn writes_halted(&self) -> bool {
        self.breaker.is_halted()
    }

    /// Accept writes again after a halt.
    pub fn resume_writes(&self) {
        self.breaker.resume();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Events matching `filter`, newest first.
    ///
    /// A missing limit is replaced by the default cap and larger limits
    /// are clamped to the hard cap.
    pub async fn query(&self, filter: Filter) -> Result<Vec<Event>> {
        let filter = self.admit_filter(filter)?;
        self.run_query(filter).await
    }

    /// Number of events matching `filter`. The limit is ignored.
    pub async fn count(&self, filter: Filter) -> Result<u64> {
        let filter = self.admit_filter(filter)?;
        let store = Arc::clone(&self.store);
        Ok(task::spawn_blocking(move || query::count(&*store, &filter)).await??)
    }

    /// Get an event by id.
    pub async fn get(&self, id: EventId) -> Result<Option<Event>> {
        let store = Arc::clone(&self.store);
        Ok(task::spawn_blocking(move || store.get(&id)).await??)
    }

    /// Open a subscription: stored matches first, then live ones.
    pub async fn subscribe(&self, filter: Filter) -> Result<Subscription> {
        let bounded = self.admit_filter(filter.clone())?;

        // Listen before querying so nothing admitted in between is missed.
        let live = self.hub.receiver();
        let stored = self.run_query(bounded).await?;

        debug!(stored = stored.len(), "subscription opened");
        Ok(Subscription::new(filter, stored, live))
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn admit_filter(&self, mut filter: Filter) -> Result<Filter> {
        if let Err(rejection) = self.policy.admit_filter(&filter) {
            debug!(kinds = ?filter.kinds, "filter rejected by policy");
            return Err(RelayError::FilterRejected(rejection));
        }
        filter.validate()?;
        filter.limit = Some(self.limits.apply(filter.limit));
        Ok(filter)
    }

    async fn run_query(&self, filter: Filter) -> Result<Vec<Event>> {
        let store = Arc::clone(&self.store);
        Ok(task::spawn_blocking(move || query::query(&*store, &filter)).await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_relay_core::{EventBuilder, Keypair};
    use wallet_relay_store::MemoryStore;

    fn relay() -> Relay<MemoryStore> {
        Relay::new(MemoryStore::new(), &RelayConfig::default())
    }

    fn keypair() -> Keypair {
        Keypair::from_seed(&[3; 32]).unwrap()
    }

    #[tokio::test]
    async fn test_submit_and_query() {
        let relay = relay();
        let event = EventBuilder::new(7376)
            .created_at(100)
            .content("history")
            .sign(&keypair())
            .unwrap();

        let submission = relay.submit(event.clone()).await.unwrap();
        assert_eq!(
            submission,
            Submission::Accepted {
                id: event.id,
                outcome: PutOutcome::Stored
            }
        );

        let found = relay.query(Filter::new().kinds([7376])).await.unwrap();
        assert_eq!(found, vec![event.clone()]);
        assert_eq!(relay.get(event.id).await.unwrap(), Some(event));
    }

    #[tokio::test]
    async fn test_policy_runs_before_verification() {
        let relay = relay();
        let mut event = EventBuilder::new(1).created_at(1).sign(&keypair()).unwrap();
        event.sig.0[0] ^= 1;

        let submission = relay.submit(event).await.unwrap();
        assert_eq!(submission.rejection(), Some(&Rejection::kind_not_allowed()));
    }

    #[tokio::test]
    async fn test_tampered_event_rejected() {
        let relay = relay();
        let mut event = EventBuilder::new(7375).created_at(1).sign(&keypair()).unwrap();
        event.content.push('!');

        let submission = relay.submit(event.clone()).await.unwrap();
        assert_eq!(submission.rejection(), Some(&Rejection::invalid_signature()));
        assert_eq!(relay.get(event.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_query_limit_caps() {
        let relay = relay();
        assert_eq!(relay.limits().apply(None), 500);

        let filter = relay.admit_filter(Filter::new().limit(100_000)).unwrap();
        assert_eq!(filter.limit, Some(5000));

        let err = relay
            .admit_filter(Filter::new().since(10).until(5))
            .unwrap_err();
        assert!(matches!(err, RelayError::InvalidFilter(_)));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_filter_rejected_by_policy() {
        let relay = relay();
        let err = relay.query(Filter::new().kinds([1])).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid-filter: only wallet kinds are allowed");
    }
}
