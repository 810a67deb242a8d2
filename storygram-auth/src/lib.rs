//! StoryGram Authentication
//!
//! Provides:
//! - HS256 bearer credential issuing and validation
//! - Bearer token extraction for route guards
//! - Login endpoint backed by a pluggable credential verifier

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod handlers;
pub mod jwt;
pub mod middleware;

pub use handlers::{AllowAllVerifier, AuthState, CredentialVerifier};
pub use jwt::{Credential, CredentialClaims, JwtManager};
pub use middleware::{extract_bearer, AuthContext};
