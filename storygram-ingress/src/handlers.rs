//! HTTP handlers for story endpoints

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use storygram_auth::handlers::AuthState;
use storygram_auth::middleware::authorize;
use storygram_common::clock::SharedClock;
use storygram_common::config::StoriesConfig;
use storygram_common::error::{Error, Result};
use storygram_common::http::error_response;
use storygram_common::types::{Story, StoryId};
use storygram_store::StoryStore;

use crate::validation::validate_submission;

/// Shared ingress state
pub struct IngressState {
    pub store: Arc<dyn StoryStore>,
    pub auth: Arc<AuthState>,
    pub clock: SharedClock,
    pub max_content_length: usize,
    story_ttl: Duration,
}

impl IngressState {
    /// Build ingress state from the stories configuration
    ///
    /// # Errors
    /// `ConfigError` when `ttl_hours` does not fit a duration.
    pub fn new(
        store: Arc<dyn StoryStore>,
        auth: Arc<AuthState>,
        clock: SharedClock,
        config: &StoriesConfig,
    ) -> Result<Self> {
        let story_ttl = i64::try_from(config.ttl_hours)
            .ok()
            .and_then(Duration::try_hours)
            .ok_or_else(|| Error::ConfigError("stories.ttl_hours is out of range".to_string()))?;
        Ok(Self {
            store,
            auth,
            clock,
            max_content_length: config.max_content_length,
            story_ttl,
        })
    }

    /// Lifetime given to new stories
    #[must_use]
    pub fn story_ttl(&self) -> Duration {
        self.story_ttl
    }
}

/// Body of `POST /new-story`
#[derive(Debug, Deserialize)]
pub struct NewStoryRequest {
    #[serde(default, alias = "userID")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewStoryResponse {
    pub id: StoryId,
    pub message: String,
}

/// POST /new-story - Submit a story
pub async fn create_story(
    req: HttpRequest,
    state: web::Data<Arc<IngressState>>,
    body: web::Json<NewStoryRequest>,
) -> HttpResponse {
    let body = body.into_inner();

    let owner = match resolve_owner(&req, &state.auth, body.user_id) {
        Ok(owner) => owner,
        Err(e) => return error_response(&e),
    };

    let submission = match validate_submission(
        owner.as_deref(),
        &body.content,
        body.metadata,
        state.max_content_length,
    ) {
        Ok(submission) => submission,
        Err(e) => {
            debug!(error = %e, "Rejected story submission");
            return error_response(&e);
        }
    };

    let story = Story::new(
        &submission.user_id,
        &submission.content,
        submission.metadata,
        state.clock.now(),
        state.story_ttl,
    );

    match state.store.append(story).await {
        Ok(id) => {
            info!(story_id = %id, user_id = %submission.user_id, "Story created");
            HttpResponse::Created().json(NewStoryResponse {
                id,
                message: "New story created successfully".to_string(),
            })
        }
        Err(e) => {
            warn!(error = %e, "Failed to store story");
            error_response(&e)
        }
    }
}

/// GET /stories/{user_id} - Unexpired stories of one owner
pub async fn list_stories(
    state: web::Data<Arc<IngressState>>,
    path: web::Path<String>,
) -> HttpResponse {
    let user_id = path.into_inner();
    match state.store.query_by_owner(&user_id).await {
        Ok(stories) => HttpResponse::Ok().json(stories),
        Err(e) => error_response(&e),
    }
}

/// POST /stories/{id}/view - Count a view
pub async fn record_view(
    state: web::Data<Arc<IngressState>>,
    path: web::Path<String>,
) -> HttpResponse {
    let Ok(id) = path.parse::<StoryId>() else {
        return error_response(&Error::ValidationError(format!(
            "invalid story id: {}",
            path.as_str()
        )));
    };

    match state.store.record_view(id).await {
        Ok(story) => HttpResponse::Ok().json(story),
        Err(e) => error_response(&e),
    }
}

/// Decide whose story this is.
///
/// Without enforcement the body's owner is taken as is. With enforcement
/// the credential subject is the owner, and a body owner must agree with it.
fn resolve_owner(
    req: &HttpRequest,
    auth: &AuthState,
    claimed: Option<String>,
) -> Result<Option<String>> {
    let Some(context) = authorize(req, &auth.jwt_manager, auth.require_for_ingress)? else {
        return Ok(claimed);
    };

    match claimed {
        Some(claimed) if !claimed.trim().is_empty() && claimed.trim() != context.user_id => {
            warn!(subject = %context.user_id, claimed = %claimed, "Story owner does not match credential");
            Err(Error::InvalidCredentials)
        }
        _ => Ok(Some(context.user_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use chrono::Utc;
    use serde_json::json;
    use storygram_auth::handlers::AllowAllVerifier;
    use storygram_auth::jwt::JwtManager;
    use storygram_common::clock::{Clock, ManualClock};
    use storygram_store::MemoryStore;

    struct Fixture {
        state: Arc<IngressState>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture(require_auth: bool) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let auth = Arc::new(AuthState {
            jwt_manager: Arc::new(JwtManager::new("ingress-test-secret-value", 900, clock.clone())),
            verifier: Arc::new(AllowAllVerifier),
            require_for_ingress: require_auth,
            require_for_notifications: false,
        });
        let state = IngressState::new(store.clone(), auth, clock.clone(), &StoriesConfig::default()).unwrap();
        Fixture {
            state: Arc::new(state),
            store,
            clock,
        }
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state.clone()))
                    .route("/new-story", web::post().to(create_story))
                    .route("/stories/{user_id}", web::get().to(list_stories))
                    .route("/stories/{id}/view", web::post().to(record_view)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_create_story() {
        let fx = fixture(false);
        let app = app!(fx.state);

        let req = test::TestRequest::post()
            .uri("/new-story")
            .set_json(json!({"userID": "user123", "content": "Hello, this is my first story!"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: NewStoryResponse = test::read_body_json(resp).await;
        assert_eq!(body.message, "New story created successfully");

        let stories = fx.store.query_by_owner("user123").await.unwrap();
        assert_eq!(stories.len(), 1);
        let story = &stories[0];
        assert_eq!(story.id, body.id);
        assert_eq!(story.views, 0);
        assert_eq!(story.created_at, fx.clock.now());
        assert_eq!(story.expires_at - story.created_at, Duration::hours(24));
    }

    #[actix_rt::test]
    async fn test_empty_content_is_bad_request() {
        let fx = fixture(false);
        let app = app!(fx.state);

        let req = test::TestRequest::post()
            .uri("/new-story")
            .set_json(json!({"user_id": "user123", "content": "  "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(fx.store.is_empty());
    }

    #[actix_rt::test]
    async fn test_store_failure_is_server_error() {
        let fx = fixture(false);
        fx.store.set_available(false);
        let app = app!(fx.state);

        let req = test::TestRequest::post()
            .uri("/new-story")
            .set_json(json!({"user_id": "user123", "content": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_rt::test]
    async fn test_enforced_auth_uses_credential_subject() {
        let fx = fixture(true);
        let token = fx.state.auth.jwt_manager.issue("user123").unwrap().token;
        let app = app!(fx.state);

        let req = test::TestRequest::post()
            .uri("/new-story")
            .set_json(json!({"content": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/new-story")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"user_id": "someone-else", "content": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/new-story")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .set_json(json!({"content": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(fx.store.query_by_owner("user123").await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn test_list_and_view() {
        let fx = fixture(false);
        let story = Story::new("user123", "seen", None, fx.clock.now(), Duration::hours(24));
        let id = fx.store.append(story).await.unwrap();
        let app = app!(fx.state);

        let req = test::TestRequest::post()
            .uri(&format!("/stories/{id}/view"))
            .to_request();
        let viewed: Story = test::call_and_read_body_json(&app, req).await;
        assert_eq!(viewed.views, 1);

        let req = test::TestRequest::get().uri("/stories/user123").to_request();
        let listed: Vec<Story> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].views, 1);

        let req = test::TestRequest::post().uri("/stories/not-a-uuid/view").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/stories/{}/view", StoryId::new()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
