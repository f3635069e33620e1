//! Live subscriptions.
//!
//! A subscription first yields the stored events that matched when it was
//! opened, then every newly admitted event that matches its filter.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use wallet_relay_core::{Event, EventId, Filter};

/// Fan-out of admitted events to live subscribers.
#[derive(Debug, Clone)]
pub(crate) struct Hub {
    sender: broadcast::Sender<Arc<Event>>,
}

impl Hub {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn publish(&self, event: Event) {
        // No receivers is not an error.
        let _ = self.sender.send(Arc::new(event));
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<Arc<Event>> {
        self.sender.subscribe()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// An open subscription.
pub struct Subscription {
    filter: Filter,
    stored: VecDeque<Event>,
    seen: HashSet<EventId>,
    live: broadcast::Receiver<Arc<Event>>,
}

impl Subscription {
    pub(crate) fn new(
        filter: Filter,
        stored: Vec<Event>,
        live: broadcast::Receiver<Arc<Event>>,
    ) -> Self {
        let seen = stored.iter().map(|e| e.id).collect();
        Self {
            filter,
            stored: stored.into(),
            seen,
            live,
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Take the stored events not yet yielded by [`Subscription::next`].
    ///
    /// After this call every further event is live.
    pub fn drain_stored(&mut self) -> Vec<Event> {
        self.stored.drain(..).collect()
    }

    /// Stored events still pending.
    pub fn stored_remaining(&self) -> usize {
        self.stored.len()
    }

    /// Next event: stored ones first, then live ones.
    ///
    /// Returns `None` once the relay is gone.
    pub async fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.stored.pop_front() {
            return Some(event);
        }
        loop {
            match self.live.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) && !self.seen.contains(&event.id) {
                        return Some(Event::clone(&event));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagging, live events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_relay_core::{EventBuilder, Keypair};

    fn event(kind: u16, created_at: u64) -> Event {
        let kp = Keypair::from_seed(&[9; 32]).unwrap();
        EventBuilder::new(kind)
            .created_at(created_at)
            .sign(&kp)
            .unwrap()
    }

    #[tokio::test]
    async fn test_stored_then_live() {
        let hub = Hub::new(16);
        let stored = event(7375, 1);
        let mut sub = Subscription::new(
            Filter::new().kinds([7375]),
            vec![stored.clone()],
            hub.receiver(),
        );

        hub.publish(event(7376, 2));
        let live = event(7375, 3);
        hub.publish(live.clone());

        assert_eq!(sub.next().await, Some(stored));
        assert_eq!(sub.next().await, Some(live));
    }

    #[tokio::test]
    async fn test_live_skips_already_stored() {
        let hub = Hub::new(16);
        let e = event(7375, 1);
        let mut sub = Subscription::new(Filter::new(), vec![e.clone()], hub.receiver());
        assert_eq!(sub.drain_stored(), vec![e.clone()]);

        hub.publish(e);
        let next = event(7375, 2);
        hub.publish(next.clone());
        assert_eq!(sub.next().await, Some(next));
    }

    #[tokio::test]
    async fn test_closed_hub_ends_subscription() {
        let hub = Hub::new(4);
        let mut sub = Subscription::new(Filter::new(), Vec::new(), hub.receiver());
        assert_eq!(hub.subscriber_count(), 1);
        drop(hub);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_going() {
        let hub = Hub::new(2);
        let mut sub = Subscription::new(Filter::new(), Vec::new(), hub.receiver());
        for t in 0..5 {
            hub.publish(event(7375, t));
        }
        // The two most recent survive.
        assert_eq!(sub.next().await.map(|e| e.created_at), Some(3));
        assert_eq!(sub.next().await.map(|e| e.created_at), Some(4));
    }
}
