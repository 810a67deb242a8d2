//! Common types for StoryGram

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Story Types
// ============================================================================

/// Opaque story identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(Uuid);

impl StoryId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for StoryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A short-lived story posted by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: StoryId,
    pub user_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Story {
    /// Create a new story with zero views expiring `ttl` after `created_at`
    #[must_use]
    pub fn new(
        user_id: &str,
        content: &str,
        metadata: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: StoryId::new(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            metadata,
            views: 0,
            created_at,
            expires_at: created_at + ttl,
        }
    }

    /// Whether the story is past its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Story summary pushed to live subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryPayload {
    pub id: StoryId,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Outbound websocket frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoryNotification {
    NewStory { story: StoryPayload },
}

impl StoryNotification {
    #[must_use]
    pub fn new_story(story: &Story) -> Self {
        Self::NewStory {
            story: StoryPayload {
                id: story.id,
                user_id: story.user_id.clone(),
                content: story.content.clone(),
                created_at: story.created_at,
                expires_at: story.expires_at,
            },
        }
    }

    /// Content of the story carried by this notification
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::NewStory { story } => &story.content,
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

/// Error body returned by HTTP endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub error_description: String,
}

impl ApiError {
    pub fn new(error: &str, description: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.into(),
        }
    }
}
