//! Store adapter contract

use futures::stream::BoxStream;

use storygram_common::error::Result;
use storygram_common::types::{Story, StoryId};

use crate::event::ChangeEvent;

/// Live feed of store changes. Infinite while healthy; an `Err` item means
/// the feed broke and must be re-opened with [`StoryStore::stream_inserts`].
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent>>;

/// Contract every story store must implement.
///
/// Implementations must be safe for concurrent use by ingress requests and
/// the change listener.
#[async_trait::async_trait]
pub trait StoryStore: Send + Sync {
    /// Append a story and return its identifier
    async fn append(&self, story: Story) -> Result<StoryId>;

    /// Unexpired stories owned by `user_id`, oldest first
    async fn query_by_owner(&self, user_id: &str) -> Result<Vec<Story>>;

    /// Increment the view count of a story and return the updated record
    async fn record_view(&self, id: StoryId) -> Result<Story>;

    /// Remove expired stories, returning how many were dropped
    async fn purge_expired(&self) -> Result<usize>;

    /// Open a new subscription to the change feed
    async fn stream_inserts(&self) -> Result<ChangeStream>;
}
