//! Route table and health endpoint

use actix_web::error::InternalError;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{guard, web, HttpRequest, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use storygram_auth::handlers::{self as auth_handlers, AuthState};
use storygram_common::error::Error;
use storygram_common::http::error_response;
use storygram_ingress::handlers::{self as ingress_handlers, IngressState};
use storygram_realtime::{websocket_handler, ListenerState, RealtimeState, SubscriberRegistry};

/// State behind `GET /health`
pub struct HealthState {
    pub registry: Arc<SubscriberRegistry>,
    pub listener: watch::Receiver<ListenerState>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    version: &'static str,
    listener: ListenerState,
    subscribers: usize,
}

/// Everything the HTTP handlers share
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthState>,
    pub ingress: Arc<IngressState>,
    pub realtime: Arc<RealtimeState>,
    pub health: Arc<HealthState>,
}

impl AppState {
    /// Register state and routes on an app or scope
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.auth.clone()))
            .app_data(web::Data::new(self.ingress.clone()))
            .app_data(web::Data::new(self.realtime.clone()))
            .app_data(web::Data::new(self.health.clone()))
            .app_data(web::JsonConfig::default().error_handler(json_error))
            .app_data(web::FormConfig::default().error_handler(form_error))
            .route("/health", web::get().to(health_handler))
            .route("/new-story", web::post().to(ingress_handlers::create_story))
            .route("/stories/{user_id}", web::get().to(ingress_handlers::list_stories))
            .route("/stories/{id}/view", web::post().to(ingress_handlers::record_view))
            .route("/ws", web::get().to(websocket_handler))
            .service(
                web::resource("/login")
                    .route(
                        web::post()
                            .guard(guard::fn_guard(is_json))
                            .to(auth_handlers::login_json),
                    )
                    .route(web::post().to(auth_handlers::login_form)),
            );
    }
}

/// Malformed JSON bodies get the same error body as any other bad request
fn json_error(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = error_response(&Error::ValidationError(err.to_string()));
    InternalError::from_response(err, response).into()
}

fn form_error(err: actix_web::error::UrlencodedError, _req: &HttpRequest) -> actix_web::Error {
    let response = error_response(&Error::ValidationError(err.to_string()));
    InternalError::from_response(err, response).into()
}

fn is_json(ctx: &guard::GuardContext<'_>) -> bool {
    ctx.head()
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// GET /health
async fn health_handler(state: web::Data<Arc<HealthState>>) -> HttpResponse {
    let listener = *state.listener.borrow();
    let status = if listener == ListenerState::Streaming {
        "ok"
    } else {
        "degraded"
    };
    HttpResponse::Ok().json(HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        listener,
        subscribers: state.registry.len(),
    })
}
