//! Error types for StoryGram services

use thiserror::Error;

/// StoryGram error types
#[derive(Error, Debug)]
pub enum Error {
    // Client input
    #[error("Validation error: {0}")]
    ValidationError(String),

    // Authentication Errors
    #[error("Missing credential")]
    MissingCredential,

    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Credential expired")]
    ExpiredCredential,

    #[error("Invalid credential signature")]
    InvalidSignature,

    #[error("Invalid credentials")]
    InvalidCredentials,

    // Store Errors
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Story not found: {0}")]
    StoryNotFound(String),

    // Realtime Errors
    #[error("Subscriber already registered: {0}")]
    DuplicateSubscriber(String),

    #[error("Subscriber limit reached: max {max} connections")]
    SubscriberLimitReached { max: usize },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    // General Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Service unavailable")]
    ServiceUnavailable,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for StoryGram operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status code for each error type
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ValidationError(_) => 400,

            Self::MissingCredential
            | Self::MalformedCredential
            | Self::ExpiredCredential
            | Self::InvalidSignature
            | Self::InvalidCredentials => 401,

            Self::StoryNotFound(_) => 404,

            Self::DuplicateSubscriber(_) => 409,

            Self::SubscriberLimitReached { .. } | Self::ServiceUnavailable => 503,

            Self::StoreUnavailable(_)
            | Self::TransportError(_)
            | Self::StreamError(_)
            | Self::ConfigError(_)
            | Self::InternalError(_)
            | Self::IoError(_)
            | Self::JsonError(_) => 500,
        }
    }

    /// Error code for API responses
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation_error",
            Self::MissingCredential => "missing_credential",
            Self::MalformedCredential => "malformed_credential",
            Self::ExpiredCredential => "expired_credential",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidCredentials => "invalid_credentials",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::StoryNotFound(_) => "not_found",
            Self::DuplicateSubscriber(_) => "duplicate_subscriber",
            Self::SubscriberLimitReached { .. } => "subscriber_limit_reached",
            Self::TransportError(_) => "transport_error",
            Self::StreamError(_) => "stream_error",
            Self::ConfigError(_) => "config_error",
            Self::InternalError(_) => "internal_error",
            Self::ServiceUnavailable => "service_unavailable",
            Self::IoError(_) => "io_error",
            Self::JsonError(_) => "json_error",
        }
    }

    /// Whether this error belongs to the credential family
    #[must_use]
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential
                | Self::MalformedCredential
                | Self::ExpiredCredential
                | Self::InvalidSignature
                | Self::InvalidCredentials
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::ValidationError("x".into()).status_code(), 400);
        assert_eq!(Error::ExpiredCredential.status_code(), 401);
        assert_eq!(Error::StoreUnavailable("down".into()).status_code(), 500);
        assert_eq!(Error::SubscriberLimitReached { max: 1 }.status_code(), 503);
    }

    #[test]
    fn test_auth_family() {
        assert!(Error::MissingCredential.is_auth_error());
        assert!(Error::InvalidSignature.is_auth_error());
        assert!(!Error::ValidationError(String::new()).is_auth_error());
    }
}
