//! HTTP handlers for credential endpoints

use actix_web::{web, HttpResponse};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use storygram_common::error::{Error, Result};
use storygram_common::http::error_response;

use crate::jwt::JwtManager;

/// Checks a user's password before a credential is issued
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify `password` for `user_id`
    async fn verify(&self, user_id: &str, password: &str) -> Result<()>;
}

/// Verifier accepting every login; password storage lives outside StoryGram
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllVerifier;

#[async_trait]
impl CredentialVerifier for AllowAllVerifier {
    async fn verify(&self, _user_id: &str, _password: &str) -> Result<()> {
        Ok(())
    }
}

/// Shared auth state
pub struct AuthState {
    pub jwt_manager: Arc<JwtManager>,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub require_for_ingress: bool,
    pub require_for_notifications: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "userID")]
    pub user_id: String,
    #[serde(default)]
    pub password: String,
}

/// POST /login (form encoded)
pub async fn login_form(
    state: web::Data<Arc<AuthState>>,
    request: web::Form<LoginRequest>,
) -> HttpResponse {
    login(&state, &request.into_inner()).await
}

/// POST /login (JSON)
pub async fn login_json(
    state: web::Data<Arc<AuthState>>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    login(&state, &request.into_inner()).await
}

async fn login(state: &AuthState, request: &LoginRequest) -> HttpResponse {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return error_response(&Error::ValidationError("userID is required".to_string()));
    }

    if let Err(e) = state.verifier.verify(user_id, &request.password).await {
        warn!(user_id = %user_id, "Login rejected");
        return error_response(&e);
    }

    match state.jwt_manager.issue(user_id) {
        Ok(credential) => {
            info!(user_id = %user_id, expires_at = %credential.expires_at, "Issued credential");
            HttpResponse::Ok().json(serde_json::json!({ "token": credential.token }))
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use chrono::Utc;
    use storygram_common::clock::ManualClock;

    struct DenyAll;

    #[async_trait]
    impl CredentialVerifier for DenyAll {
        async fn verify(&self, _user_id: &str, _password: &str) -> Result<()> {
            Err(Error::InvalidCredentials)
        }
    }

    fn state(verifier: Arc<dyn CredentialVerifier>) -> Arc<AuthState> {
        Arc::new(AuthState {
            jwt_manager: Arc::new(JwtManager::new(
                "handler-test-secret-value",
                900,
                Arc::new(ManualClock::new(Utc::now())),
            )),
            verifier,
            require_for_ingress: false,
            require_for_notifications: false,
        })
    }

    #[actix_rt::test]
    async fn test_login_returns_token() {
        let state = state(Arc::new(AllowAllVerifier));
        let jwt = state.jwt_manager.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/login", web::post().to(login_form)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("userID", "user123"), ("password", "secret")])
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let token = body["token"].as_str().unwrap();
        assert_eq!(jwt.validate(token).unwrap(), "user123");
    }

    #[actix_rt::test]
    async fn test_login_rejected_by_verifier() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(DenyAll))))
                .route("/login", web::post().to(login_json)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_json(serde_json::json!({"user_id": "user123", "password": "nope"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn test_login_requires_user() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state(Arc::new(AllowAllVerifier))))
                .route("/login", web::post().to(login_form)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form([("userID", ""), ("password", "x")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
