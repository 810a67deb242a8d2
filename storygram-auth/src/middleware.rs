//! Bearer credential guards for protected routes

use actix_web::HttpRequest;

use storygram_common::error::{Error, Result};

use crate::jwt::JwtManager;

/// Authenticated principal attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
}

/// Extract the bearer token from the `Authorization` header
///
/// # Errors
/// Returns `MissingCredential` when the header is absent or not a bearer token.
pub fn extract_bearer(req: &HttpRequest) -> Result<String> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(Error::MissingCredential)
}

/// Validate the request's bearer credential
///
/// # Errors
/// Any credential error from extraction or validation.
pub fn validate_request(req: &HttpRequest, jwt_manager: &JwtManager) -> Result<AuthContext> {
    let token = extract_bearer(req)?;
    let user_id = jwt_manager.validate(&token)?;
    Ok(AuthContext { user_id })
}

/// Apply the enforcement switch for a route.
///
/// When `required` is false the request passes without a context, even if
/// it carries a credential.
///
/// # Errors
/// Credential errors when `required` is true.
pub fn authorize(
    req: &HttpRequest,
    jwt_manager: &JwtManager,
    required: bool,
) -> Result<Option<AuthContext>> {
    if !required {
        return Ok(None);
    }
    match validate_request(req, jwt_manager) {
        Ok(context) => Ok(Some(context)),
        Err(e) => {
            tracing::debug!(path = %req.path(), error = %e, "Rejected request credential");
            Err(e)
        }
    }
}
