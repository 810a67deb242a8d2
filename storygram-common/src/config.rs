//! Configuration types for StoryGram

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main configuration for all StoryGram services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryGramConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Credential issuing and enforcement
    pub auth: AuthConfig,
    /// Live notification configuration
    pub realtime: RealtimeConfig,
    /// Change listener retry policy
    pub listener: ListenerConfig,
    /// Story lifecycle configuration
    pub stories: StoriesConfig,
}

impl StoryGramConfig {
    /// Reject configurations the services cannot run with
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        match self.auth.jwt_secret.as_deref() {
            None => {
                return Err(Error::ConfigError(
                    "auth.jwt_secret must be supplied (config, --jwt-secret or STORYGRAM_JWT_SECRET)"
                        .to_string(),
                ))
            }
            Some(secret) if secret.len() < 16 => {
                return Err(Error::ConfigError(
                    "auth.jwt_secret must be at least 16 bytes".to_string(),
                ))
            }
            Some(_) => {}
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(Error::ConfigError("auth.token_ttl_secs must be > 0".to_string()));
        }
        if self.realtime.message_buffer_size == 0 {
            return Err(Error::ConfigError(
                "realtime.message_buffer_size must be > 0".to_string(),
            ));
        }
        if self.realtime.max_connections == 0 {
            return Err(Error::ConfigError(
                "realtime.max_connections must be > 0".to_string(),
            ));
        }
        if self.realtime.heartbeat_interval == 0 {
            return Err(Error::ConfigError(
                "realtime.heartbeat_interval must be > 0".to_string(),
            ));
        }
        if self.listener.max_delay_ms < self.listener.base_delay_ms {
            return Err(Error::ConfigError(
                "listener.max_delay_ms must be >= listener.base_delay_ms".to_string(),
            ));
        }
        if self.listener.backoff_multiplier < 1.0 {
            return Err(Error::ConfigError(
                "listener.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }
        if self.stories.max_content_length == 0 {
            return Err(Error::ConfigError(
                "stories.max_content_length must be > 0".to_string(),
            ));
        }
        if self.stories.ttl_hours == 0 {
            return Err(Error::ConfigError("stories.ttl_hours must be > 0".to_string()));
        }
        if self.stories.purge_interval_secs == 0 {
            return Err(Error::ConfigError(
                "stories.purge_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port (default: 8080)
    pub port: u16,
    /// Number of HTTP workers
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: 4,
        }
    }
}

/// Credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret; never embedded in source
    pub jwt_secret: Option<String>,
    /// Credential validity in seconds (default: 900)
    pub token_ttl_secs: u64,
    /// Require a bearer credential on `POST /new-story`
    pub require_for_ingress: bool,
    /// Require a bearer credential on `GET /ws`
    pub require_for_notifications: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 900,
            require_for_ingress: false,
            require_for_notifications: false,
        }
    }
}

/// Live notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Maximum concurrent websocket subscribers
    pub max_connections: usize,
    /// Heartbeat interval in seconds
    pub heartbeat_interval: u64,
    /// Per-subscriber notification buffer
    pub message_buffer_size: usize,
    /// Largest inbound frame accepted, in bytes
    pub max_frame_size: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            heartbeat_interval: 30,
            message_buffer_size: 256,
            max_frame_size: 64 * 1024,
        }
    }
}

/// Change listener retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Consecutive failed resubscriptions before giving up
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub base_delay_ms: u64,
    /// Maximum delay between attempts in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (e.g., 2.0 for doubling)
    pub backoff_multiplier: f64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Story lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoriesConfig {
    /// Story time-to-live in hours (default: 24)
    pub ttl_hours: u64,
    /// Maximum content length in characters
    pub max_content_length: usize,
    /// Expired story purge interval in seconds (must be > 0)
    pub purge_interval_secs: u64,
}

impl Default for StoriesConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            max_content_length: 500,
            purge_interval_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> StoryGramConfig {
        let mut config = StoryGramConfig::default();
        config.auth.jwt_secret = Some("a-test-secret-of-enough-length".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = StoryGramConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.token_ttl_secs, 900);
        assert_eq!(config.stories.ttl_hours, 24);
        assert!(!config.auth.require_for_ingress);
    }

    #[test]
    fn test_missing_secret_rejected() {
        let config = StoryGramConfig::default();
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        let mut config = valid_config();
        config.listener.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut config = valid_config();
        config.realtime.max_connections = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_inverted_delays_rejected() {
        let mut config = valid_config();
        config.listener.base_delay_ms = 5_000;
        config.listener.max_delay_ms = 1_000;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_zero_purge_interval_rejected() {
        let mut config = valid_config();
        config.stories.purge_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = valid_config();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: StoryGramConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.server.port, parsed.server.port);
        assert_eq!(config.auth.jwt_secret, parsed.auth.jwt_secret);
    }
}
