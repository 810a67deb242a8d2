//! Subscriber registry
//!
//! Tracks live notification sinks by connection identifier. The registry
//! never owns a transport: each entry is the sending half of a bounded
//! channel whose receiver lives in the websocket session task. Dropping the
//! entry closes that channel, which ends the session.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use storygram_common::error::{Error, Result};
use storygram_common::types::StoryNotification;

/// Opaque identifier of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.simple().fmt(f)
    }
}

/// Sending side of a subscriber's notification queue
#[derive(Debug, Clone)]
pub struct SubscriberHandle {
    tx: mpsc::Sender<Arc<StoryNotification>>,
}

impl SubscriberHandle {
    /// Create a handle and the receiver the session task drains
    #[must_use]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Arc<StoryNotification>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    fn deliver(&self, payload: &Arc<StoryNotification>) -> std::result::Result<(), DeliveryFailure> {
        self.tx.try_send(payload.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::BufferFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Disconnected,
        })
    }
}

/// Why a notification could not be handed to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailure {
    /// The session stopped draining its queue
    BufferFull,
    /// The session is gone
    Disconnected,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferFull => write!(f, "notification buffer full"),
            Self::Disconnected => write!(f, "subscriber disconnected"),
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    /// Subscribers that accepted the payload
    pub delivered: usize,
    /// Per-subscriber failures; these subscribers have been unregistered
    pub failures: Vec<(SubscriberId, DeliveryFailure)>,
}

impl DeliveryReport {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }
}

/// Registry of live notification subscribers
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
    max_subscribers: usize,
}

impl SubscriberRegistry {
    /// Create a registry admitting at most `max_subscribers` entries
    #[must_use]
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            max_subscribers,
        }
    }

    /// Add a subscriber
    ///
    /// # Errors
    /// `DuplicateSubscriber` if `id` is present, `SubscriberLimitReached` when full.
    pub fn register(&self, id: SubscriberId, handle: SubscriberHandle) -> Result<()> {
        let mut subscribers = self.subscribers.write();
        if subscribers.contains_key(&id) {
            return Err(Error::DuplicateSubscriber(id.to_string()));
        }
        if subscribers.len() >= self.max_subscribers {
            return Err(Error::SubscriberLimitReached {
                max: self.max_subscribers,
            });
        }
        subscribers.insert(id, handle);
        debug!(subscriber = %id, active = subscribers.len(), "Registered subscriber");
        Ok(())
    }

    /// Remove a subscriber; absent ids are ignored
    pub fn unregister(&self, id: SubscriberId) {
        let removed = self.subscribers.write().remove(&id);
        if removed.is_some() {
            debug!(subscriber = %id, "Unregistered subscriber");
        }
    }

    /// Send `payload` to every registered subscriber.
    ///
    /// Works on a snapshot taken under the read lock; the lock is released
    /// before any send. Failed subscribers are removed once the pass ends.
    pub fn broadcast(&self, payload: &Arc<StoryNotification>) -> DeliveryReport {
        let snapshot: Vec<(SubscriberId, SubscriberHandle)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect();

        let mut report = DeliveryReport::default();
        for (id, handle) in snapshot {
            match handle.deliver(payload) {
                Ok(()) => report.delivered += 1,
                Err(failure) => {
                    warn!(subscriber = %id, %failure, "Notification delivery failed");
                    report.failures.push((id, failure));
                }
            }
        }

        if !report.failures.is_empty() {
            let mut subscribers = self.subscribers.write();
            for (id, _) in &report.failures {
                subscribers.remove(id);
            }
        }

        report
    }

    /// Drop every entry, closing all session queues
    pub fn clear(&self) {
        self.subscribers.write().clear();
    }

    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    #[must_use]
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers.read().keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::HashSet;
    use storygram_common::types::Story;

    fn notification(content: &str) -> Arc<StoryNotification> {
        let story = Story::new("user123", content, None, Utc::now(), Duration::hours(24));
        Arc::new(StoryNotification::new_story(&story))
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = SubscriberRegistry::new(10);
        let id = SubscriberId::new();
        let (handle, _rx) = SubscriberHandle::channel(4);

        registry.register(id, handle).unwrap();
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        registry.unregister(id);
        assert!(registry.is_empty());

        // Second removal is a no-op
        registry.unregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = SubscriberRegistry::new(10);
        let id = SubscriberId::new();
        let (a, _rx_a) = SubscriberHandle::channel(4);
        let (b, _rx_b) = SubscriberHandle::channel(4);

        registry.register(id, a).unwrap();
        assert!(matches!(
            registry.register(id, b),
            Err(Error::DuplicateSubscriber(_))
        ));
    }

    #[test]
    fn test_limit_enforced() {
        let registry = SubscriberRegistry::new(1);
        let (a, _rx_a) = SubscriberHandle::channel(4);
        let (b, _rx_b) = SubscriberHandle::channel(4);
        registry.register(SubscriberId::new(), a).unwrap();
        assert!(matches!(
            registry.register(SubscriberId::new(), b),
            Err(Error::SubscriberLimitReached { max: 1 })
        ));
    }

    #[test]
    fn test_broadcast_with_one_broken_subscriber() {
        let registry = SubscriberRegistry::new(10);
        let mut receivers = Vec::new();
        for _ in 0..4 {
            let (handle, rx) = SubscriberHandle::channel(4);
            registry.register(SubscriberId::new(), handle).unwrap();
            receivers.push(rx);
        }
        let broken = SubscriberId::new();
        let (handle, rx) = SubscriberHandle::channel(4);
        registry.register(broken, handle).unwrap();
        drop(rx);

        let report = registry.broadcast(&notification("hello"));
        assert_eq!(report.delivered, 4);
        assert_eq!(report.failures, vec![(broken, DeliveryFailure::Disconnected)]);
        assert!(!registry.contains(broken));
        assert_eq!(registry.len(), 4);

        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap().content(), "hello");
        }
    }

    #[test]
    fn test_slow_subscriber_dropped_when_full() {
        let registry = SubscriberRegistry::new(10);
        let id = SubscriberId::new();
        let (handle, mut rx) = SubscriberHandle::channel(1);
        registry.register(id, handle).unwrap();

        assert_eq!(registry.broadcast(&notification("one")).delivered, 1);
        let report = registry.broadcast(&notification("two"));
        assert_eq!(report.failures, vec![(id, DeliveryFailure::BufferFull)]);
        assert!(!registry.contains(id));

        // Queue drains what it got, then observes closure
        assert_eq!(rx.try_recv().unwrap().content(), "one");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_late_registration_receives_subsequent_broadcasts() {
        let registry = SubscriberRegistry::new(10);
        registry.broadcast(&notification("before"));

        let (handle, mut rx) = SubscriberHandle::channel(4);
        registry.register(SubscriberId::new(), handle).unwrap();
        registry.broadcast(&notification("after"));

        assert_eq!(rx.try_recv().unwrap().content(), "after");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_active_set_matches_operations() {
        let registry = SubscriberRegistry::new(100);
        let ids: Vec<SubscriberId> = (0..20).map(|_| SubscriberId::new()).collect();
        let mut receivers = Vec::new();
        for id in &ids {
            let (handle, rx) = SubscriberHandle::channel(1);
            registry.register(*id, handle).unwrap();
            receivers.push(rx);
        }
        for id in ids.iter().step_by(3) {
            registry.unregister(*id);
        }

        let expected: HashSet<_> = ids
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 != 0)
            .map(|(_, id)| *id)
            .collect();
        let actual: HashSet<_> = registry.subscriber_ids().into_iter().collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let registry = Arc::new(SubscriberRegistry::new(10_000));
        let mut tasks = Vec::new();

        for worker in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let mut kept = Vec::new();
                for i in 0..50 {
                    let id = SubscriberId::new();
                    let (handle, rx) = SubscriberHandle::channel(1);
                    registry.register(id, handle).unwrap();
                    if (worker + i) % 2 == 0 {
                        registry.unregister(id);
                    } else {
                        kept.push((id, rx));
                    }
                    tokio::task::yield_now().await;
                }
                kept
            }));
        }

        let mut expected = HashSet::new();
        let mut receivers = Vec::new();
        for task in tasks {
            for (id, rx) in task.await.unwrap() {
                expected.insert(id);
                receivers.push(rx);
            }
        }

        let actual: HashSet<_> = registry.subscriber_ids().into_iter().collect();
        assert_eq!(actual, expected);
    }
}
