//! Change events emitted by the store's append stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storygram_common::types::Story;

/// Type of store change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

/// A single change observed on the store.
///
/// The document is kept as raw JSON; consumers decode it themselves so that
/// one bad record cannot poison the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Unique event ID
    pub id: Uuid,
    /// Type of change
    #[serde(rename = "operationType")]
    pub change_type: ChangeType,
    /// Collection name
    pub collection: String,
    /// Timestamp of the change
    pub commit_timestamp: DateTime<Utc>,
    /// Full document after the change (INSERT and UPDATE)
    #[serde(rename = "fullDocument")]
    pub document: Option<serde_json::Value>,
}

impl ChangeEvent {
    /// Create an INSERT event
    #[must_use]
    pub fn insert(collection: &str, document: serde_json::Value) -> Self {
        Self::new(ChangeType::Insert, collection, Some(document))
    }

    /// Create an UPDATE event
    #[must_use]
    pub fn update(collection: &str, document: serde_json::Value) -> Self {
        Self::new(ChangeType::Update, collection, Some(document))
    }

    /// Create a DELETE event
    #[must_use]
    pub fn delete(collection: &str) -> Self {
        Self::new(ChangeType::Delete, collection, None)
    }

    fn new(change_type: ChangeType, collection: &str, document: Option<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            change_type,
            collection: collection.to_string(),
            commit_timestamp: Utc::now(),
            document,
        }
    }

    /// Decode the carried document as a story
    ///
    /// # Errors
    /// Fails when the event has no document or the document is not a story.
    pub fn decode_story(&self) -> Result<Story, serde_json::Error> {
        match &self.document {
            Some(doc) => serde_json::from_value(doc.clone()),
            None => Err(serde::de::Error::custom("change event carries no document")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_change_event_creation() {
        let story = Story::new("user123", "hello", None, Utc::now(), Duration::hours(24));
        let event = ChangeEvent::insert("stories", serde_json::to_value(&story).unwrap());
        assert_eq!(event.change_type, ChangeType::Insert);
        assert_eq!(event.collection, "stories");
        assert_eq!(event.decode_story().unwrap(), story);
    }

    #[test]
    fn test_decode_failures() {
        let event = ChangeEvent::insert("stories", serde_json::json!({"content": 42}));
        assert!(event.decode_story().is_err());
        assert!(ChangeEvent::delete("stories").decode_story().is_err());
    }
}
