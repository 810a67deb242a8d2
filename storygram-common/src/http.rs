//! HTTP helpers shared by the handler crates

use actix_web::HttpResponse;

use crate::error::Error;
use crate::types::ApiError;

/// Convert an error into a JSON error response.
///
/// Credential errors collapse to a single generic message.
#[must_use]
pub fn error_response(error: &Error) -> HttpResponse {
    let api_error = if error.is_auth_error() {
        ApiError::new("unauthorized", "Invalid or missing credential")
    } else {
        ApiError::new(error.error_code(), error.to_string())
    };

    match error.status_code() {
        400 => HttpResponse::BadRequest().json(api_error),
        401 => HttpResponse::Unauthorized().json(api_error),
        404 => HttpResponse::NotFound().json(api_error),
        409 => HttpResponse::Conflict().json(api_error),
        503 => HttpResponse::ServiceUnavailable().json(api_error),
        _ => HttpResponse::InternalServerError().json(api_error),
    }
}
