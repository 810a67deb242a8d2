//! In-memory story store
//!
//! Stands in for the document database. Changes are published on a tokio
//! broadcast channel under the same lock that applies them, so the change
//! feed observes writes in commit order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

use storygram_common::clock::SharedClock;
use storygram_common::error::{Error, Result};
use storygram_common::types::{Story, StoryId};

use crate::event::ChangeEvent;
use crate::store::{ChangeStream, StoryStore};

const COLLECTION: &str = "stories";
const DEFAULT_FEED_CAPACITY: usize = 1024;

/// In-memory [`StoryStore`]
pub struct MemoryStore {
    stories: RwLock<HashMap<StoryId, Story>>,
    changes: RwLock<broadcast::Sender<ChangeEvent>>,
    feed_capacity: usize,
    available: AtomicBool,
    clock: SharedClock,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self::with_feed_capacity(clock, DEFAULT_FEED_CAPACITY)
    }

    /// Create an empty store whose change feed buffers `capacity` events
    #[must_use]
    pub fn with_feed_capacity(clock: SharedClock, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            stories: RwLock::new(HashMap::new()),
            changes: RwLock::new(tx),
            feed_capacity: capacity.max(1),
            available: AtomicBool::new(true),
            clock,
        }
    }

    /// Toggle availability; while unavailable every operation fails with `StoreUnavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop every open change feed, as a lost database connection would
    pub fn disconnect_streams(&self) {
        let (tx, _) = broadcast::channel(self.feed_capacity);
        *self.changes.write() = tx;
        debug!("Disconnected all change streams");
    }

    /// Number of stored stories, expired included
    #[must_use]
    pub fn len(&self) -> usize {
        self.stories.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stories.read().is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("store is not reachable".to_string()))
        }
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is not an error: nobody is listening yet
        if self.changes.read().send(event).is_err() {
            trace!("Change event dropped, no active streams");
        }
    }
}

#[async_trait::async_trait]
impl StoryStore for MemoryStore {
    async fn append(&self, story: Story) -> Result<StoryId> {
        self.ensure_available()?;
        let document = serde_json::to_value(&story)?;
        let id = story.id;

        let mut stories = self.stories.write();
        if stories.contains_key(&id) {
            return Err(Error::StoreUnavailable(format!("duplicate story id {id}")));
        }
        stories.insert(id, story);
        self.publish(ChangeEvent::insert(COLLECTION, document));
        drop(stories);

        debug!(story_id = %id, "Appended story");
        Ok(id)
    }

    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Story>> {
        self.ensure_available()?;
        let now = self.clock.now();
        let mut found: Vec<Story> = self
            .stories
            .read()
            .values()
            .filter(|s| s.user_id == user_id && !s.is_expired(now))
            .cloned()
            .collect();
        found.sort_by_key(|s| s.created_at);
        Ok(found)
    }

    async fn record_view(&self, id: StoryId) -> Result<Story> {
        self.ensure_available()?;
        let now = self.clock.now();

        let mut stories = self.stories.write();
        let story = stories
            .get_mut(&id)
            .filter(|s| !s.is_expired(now))
            .ok_or_else(|| Error::StoryNotFound(id.to_string()))?;
        story.views = story.views.saturating_add(1);
        let updated = story.clone();
        self.publish(ChangeEvent::update(COLLECTION, serde_json::to_value(&updated)?));
        Ok(updated)
    }

    async fn purge_expired(&self) -> Result<usize> {
        self.ensure_available()?;
        let now = self.clock.now();

        let mut stories = self.stories.write();
        let before = stories.len();
        stories.retain(|_, s| !s.is_expired(now));
        let purged = before - stories.len();
        for _ in 0..purged {
            self.publish(ChangeEvent::delete(COLLECTION));
        }
        Ok(purged)
    }

    async fn stream_inserts(&self) -> Result<ChangeStream> {
        self.ensure_available()?;
        let rx = self.changes.read().subscribe();
        let stream = BroadcastStream::new(rx).map(|item| {
            item.map_err(|e: BroadcastStreamRecvError| {
                Error::StreamError(format!("change stream interrupted: {e}"))
            })
        });
        Ok(stream.boxed())
    }
}
