//! JWT credential generation and validation

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use storygram_common::clock::SharedClock;
use storygram_common::error::{Error, Result};

/// Claims carried by a StoryGram credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject (owner identifier)
    pub sub: String,
    /// Issued at (UTC timestamp)
    pub iat: i64,
    /// Expiration time (UTC timestamp)
    pub exp: i64,
}

/// A freshly issued credential
#[derive(Debug, Clone, Serialize)]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates HS256 bearer credentials.
///
/// Only HS256 is accepted on validation; tokens signed with any other
/// algorithm are rejected before their signature is looked at.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
    clock: SharedClock,
}

impl JwtManager {
    const ALGORITHM: Algorithm = Algorithm::HS256;

    /// Create a manager signing with `secret` and issuing tokens valid for `ttl_secs`
    #[must_use]
    pub fn new(secret: &str, ttl_secs: u64, clock: SharedClock) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX / 1000)),
            clock,
        }
    }

    /// Issue a credential attesting to `owner`
    ///
    /// # Errors
    /// Returns `ValidationError` for an empty owner and `InternalError` if encoding fails.
    pub fn issue(&self, owner: &str) -> Result<Credential> {
        if owner.trim().is_empty() {
            return Err(Error::ValidationError("owner identifier is required".to_string()));
        }

        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let claims = CredentialClaims {
            sub: owner.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Self::ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| Error::InternalError(format!("Failed to encode JWT: {e}")))?;

        Ok(Credential {
            token,
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Validate a credential and return its owner identifier
    ///
    /// # Errors
    /// `MissingCredential`, `MalformedCredential`, `InvalidSignature` or `ExpiredCredential`.
    pub fn validate(&self, token: &str) -> Result<String> {
        Ok(self.validate_claims(token)?.sub)
    }

    /// Validate a credential and return its full claims
    ///
    /// # Errors
    /// Same as [`JwtManager::validate`].
    pub fn validate_claims(&self, token: &str) -> Result<CredentialClaims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::MissingCredential);
        }

        // Expiry is checked against the injected clock below
        let mut validation = Validation::new(Self::ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<CredentialClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => Error::InvalidSignature,
                ErrorKind::ExpiredSignature => Error::ExpiredCredential,
                _ => Error::MalformedCredential,
            })?
            .claims;

        if claims.sub.is_empty() {
            return Err(Error::MalformedCredential);
        }
        if self.clock.now().timestamp() >= claims.exp {
            return Err(Error::ExpiredCredential);
        }

        Ok(claims)
    }

    /// Credential validity window
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
