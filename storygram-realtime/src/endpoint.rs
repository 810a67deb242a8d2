//! WebSocket notification endpoint
//!
//! `GET /ws` upgrades the connection, registers a subscriber and runs one
//! session task per client until the peer leaves, the transport fails, the
//! registry drops the subscriber, or the server shuts down. The session
//! always unregisters before it closes the transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{web, Error as ActixError, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use storygram_auth::handlers::AuthState;
use storygram_auth::middleware::authorize;
use storygram_common::config::RealtimeConfig;
use storygram_common::error::{Error, Result};
use storygram_common::http::error_response;
use storygram_common::types::StoryNotification;

use crate::registry::{SubscriberHandle, SubscriberId, SubscriberRegistry};

/// Shared state for the notification endpoint
pub struct RealtimeState {
    pub registry: Arc<SubscriberRegistry>,
    pub auth: Arc<AuthState>,
    pub config: RealtimeConfig,
    pub shutdown: CancellationToken,
    pub sessions: TaskTracker,
}

impl RealtimeState {
    /// Stop accepting sessions and wait for running ones to unregister and close
    pub async fn drain_sessions(&self) {
        self.shutdown.cancel();
        self.sessions.close();
        self.sessions.wait().await;
    }
}

/// GET /ws - Establish a notification connection
pub async fn websocket_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<Arc<RealtimeState>>,
) -> std::result::Result<HttpResponse, ActixError> {
    if state.shutdown.is_cancelled() {
        return Ok(error_response(&Error::ServiceUnavailable));
    }

    let principal = match authorize(&req, &state.auth.jwt_manager, state.auth.require_for_notifications) {
        Ok(context) => context.map(|c| c.user_id),
        Err(e) => return Ok(error_response(&e)),
    };

    let (response, session, msg_stream) = actix_ws::handle(&req, stream).map_err(|e| {
        warn!(error = %e, "WebSocket upgrade failed");
        e
    })?;

    let id = SubscriberId::new();
    let (handle, notifications) = SubscriberHandle::channel(state.config.message_buffer_size);
    if let Err(e) = state.registry.register(id, handle) {
        warn!(subscriber = %id, error = %e, "Rejecting notification connection");
        return Ok(error_response(&e));
    }

    info!(subscriber = %id, user = ?principal, "Notification session opened");

    let msg_stream = msg_stream.max_frame_size(state.config.max_frame_size);
    let state = state.get_ref().clone();
    let session_task = state.sessions.track_future(run_session(
        id,
        session,
        msg_stream,
        notifications,
        state.clone(),
    ));
    actix_web::rt::spawn(session_task);

    Ok(response)
}

/// Owns the transport for one subscriber
async fn run_session(
    id: SubscriberId,
    mut session: Session,
    msg_stream: MessageStream,
    notifications: mpsc::Receiver<Arc<StoryNotification>>,
    state: Arc<RealtimeState>,
) {
    let heartbeat = Duration::from_secs(state.config.heartbeat_interval);
    let reason = match session_loop(
        id,
        &mut session,
        msg_stream,
        notifications,
        &state.shutdown,
        heartbeat,
    )
    .await
    {
        Ok(reason) => reason,
        Err(e) => {
            warn!(subscriber = %id, error = %e, "Notification session failed");
            Some(CloseReason {
                code: CloseCode::Error,
                description: None,
            })
        }
    };

    state.registry.unregister(id);
    if session.close(reason).await.is_err() {
        debug!(subscriber = %id, "Transport already closed");
    }
    info!(subscriber = %id, "Notification session closed");
}

/// Returns the close reason to send once the subscriber is unregistered.
/// Transport failures are not retried.
async fn session_loop(
    id: SubscriberId,
    session: &mut Session,
    mut msg_stream: MessageStream,
    mut notifications: mpsc::Receiver<Arc<StoryNotification>>,
    shutdown: &CancellationToken,
    heartbeat: Duration,
) -> Result<Option<CloseReason>> {
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                return Ok(Some(CloseReason {
                    code: CloseCode::Away,
                    description: Some("Server shutting down".into()),
                }));
            }

            notification = notifications.recv() => {
                let Some(notification) = notification else {
                    // Registry dropped this subscriber
                    return Ok(Some(CloseReason {
                        code: CloseCode::Policy,
                        description: Some("Subscriber removed".into()),
                    }));
                };
                match serde_json::to_string(notification.as_ref()) {
                    Ok(json) => session
                        .text(json)
                        .await
                        .map_err(|_| Error::TransportError("send failed: session closed".to_string()))?,
                    Err(e) => error!(subscriber = %id, error = %e, "Failed to encode notification"),
                }
            }

            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(Message::Ping(bytes))) => {
                        last_activity = Instant::now();
                        session
                            .pong(&bytes)
                            .await
                            .map_err(|_| Error::TransportError("pong failed: session closed".to_string()))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        debug!(subscriber = %id, len = text.len(), "Received client message");
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        last_activity = Instant::now();
                        debug!(subscriber = %id, len = bytes.len(), "Received binary client message");
                    }
                    Some(Ok(Message::Close(reason))) => {
                        debug!(subscriber = %id, ?reason, "Client requested close");
                        return Ok(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(Error::TransportError(e.to_string())),
                    None => {
                        debug!(subscriber = %id, "WebSocket stream ended");
                        return Ok(None);
                    }
                }
            }

            _ = ticker.tick() => {
                if last_activity.elapsed() > heartbeat * 2 {
                    warn!(subscriber = %id, "Heartbeat timeout");
                    return Ok(Some(CloseReason {
                        code: CloseCode::Normal,
                        description: Some("Heartbeat timeout".into()),
                    }));
                }
                session
                    .ping(b"")
                    .await
                    .map_err(|_| Error::TransportError("ping failed: session closed".to_string()))?;
            }
        }
    }
}
