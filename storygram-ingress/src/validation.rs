//! Submission validation

use serde_json::Value;

use storygram_common::error::{Error, Result};

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub user_id: String,
    pub content: String,
    pub metadata: Option<Value>,
}

/// Check a raw submission.
///
/// `user_id` must be non-empty, `content` non-empty after trimming and at
/// most `max_content_length` characters, and `metadata` a JSON object when
/// present. Content is stored as sent; only the emptiness check trims.
///
/// # Errors
/// `ValidationError` describing the first rejected field.
pub fn validate_submission(
    user_id: Option<&str>,
    content: &str,
    metadata: Option<Value>,
    max_content_length: usize,
) -> Result<Submission> {
    let user_id = user_id.map(str::trim).unwrap_or_default();
    if user_id.is_empty() {
        return Err(Error::ValidationError("userID is required".to_string()));
    }

    if content.trim().is_empty() {
        return Err(Error::ValidationError("content must not be empty".to_string()));
    }
    let length = content.chars().count();
    if length > max_content_length {
        return Err(Error::ValidationError(format!(
            "content is {length} characters, limit is {max_content_length}"
        )));
    }

    let metadata = match metadata {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(Value::Object(map)),
        Some(_) => {
            return Err(Error::ValidationError("metadata must be a JSON object".to_string()))
        }
    };

    Ok(Submission {
        user_id: user_id.to_string(),
        content: content.to_string(),
        metadata,
    })
}
