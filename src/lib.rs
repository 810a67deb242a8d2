//! StoryGram
//!
//! Ephemeral story sharing backend. Users post short-lived stories and every
//! connected client is told about each new story as it is stored.
//!
//! # Features
//!
//! - **Ingress** - `POST /new-story` with validation, story listing and view tracking
//! - **Realtime** - websocket notifications fed by the store's insert stream
//! - **Authentication** - HS256 bearer credentials, optionally enforced per surface

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod routes;

pub use storygram_auth as auth;
pub use storygram_common as common;
pub use storygram_ingress as ingress;
pub use storygram_realtime as realtime;
pub use storygram_store as store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::dev::ServerHandle;
use actix_web::{middleware, App, HttpServer};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use storygram_auth::handlers::{AllowAllVerifier, AuthState};
use storygram_auth::jwt::JwtManager;
use storygram_common::clock::{SharedClock, SystemClock};
use storygram_common::config::StoryGramConfig;
use storygram_common::error::{Error, Result};
use storygram_ingress::handlers::IngressState;
use storygram_realtime::{ChangeListener, ListenerState, RealtimeState, SubscriberRegistry};
use storygram_store::{MemoryStore, StoryStore};

use crate::routes::{AppState, HealthState};

/// Main StoryGram server
pub struct StoryGramServer {
    config: StoryGramConfig,
    store: Arc<dyn StoryStore>,
    app: AppState,
    listener: ChangeListener,
    shutdown: CancellationToken,
}

impl StoryGramServer {
    /// Create a server backed by the in-memory store
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: StoryGramConfig) -> Result<Self> {
        let clock: SharedClock = Arc::new(SystemClock);
        let store = Arc::new(MemoryStore::new(clock.clone()));
        Self::with_store(config, store, clock)
    }

    /// Create a server over an existing store and clock
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn with_store(
        config: StoryGramConfig,
        store: Arc<dyn StoryStore>,
        clock: SharedClock,
    ) -> Result<Self> {
        config.validate()?;
        info!("Initializing StoryGram services");

        let secret = config
            .auth
            .jwt_secret
            .as_deref()
            .ok_or_else(|| Error::ConfigError("auth.jwt_secret is required".to_string()))?;
        let auth = Arc::new(AuthState {
            jwt_manager: Arc::new(JwtManager::new(secret, config.auth.token_ttl_secs, clock.clone())),
            verifier: Arc::new(AllowAllVerifier),
            require_for_ingress: config.auth.require_for_ingress,
            require_for_notifications: config.auth.require_for_notifications,
        });

        let shutdown = CancellationToken::new();
        let registry = Arc::new(SubscriberRegistry::new(config.realtime.max_connections));
        let listener = ChangeListener::new(
            store.clone(),
            registry.clone(),
            config.listener.clone(),
            shutdown.clone(),
        );

        let app = AppState {
            ingress: Arc::new(IngressState::new(
                store.clone(),
                auth.clone(),
                clock,
                &config.stories,
            )?),
            realtime: Arc::new(RealtimeState {
                registry: registry.clone(),
                auth: auth.clone(),
                config: config.realtime.clone(),
                shutdown: shutdown.clone(),
                sessions: TaskTracker::new(),
            }),
            health: Arc::new(HealthState {
                registry,
                listener: listener.watch(),
            }),
            auth,
        };

        Ok(Self {
            config,
            store,
            app,
            listener,
            shutdown,
        })
    }

    /// Shared handler state, for mounting the routes elsewhere
    #[must_use]
    pub fn app_state(&self) -> AppState {
        self.app.clone()
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &StoryGramConfig {
        &self.config
    }

    /// Start the listener, the purge task and the HTTP server.
    ///
    /// Returns once the listener streams and the server is bound.
    ///
    /// # Errors
    /// The listener's setup error if the first subscription fails, or an
    /// I/O error if the server cannot bind.
    pub async fn start(self) -> Result<RunningServer> {
        let Self {
            config,
            store,
            app,
            listener,
            shutdown,
        } = self;

        let mut listener = listener.spawn();
        if let Err(e) = listener.wait_started().await {
            shutdown.cancel();
            return Err(listener.join().await.err().unwrap_or(e));
        }
        let listener_task = tokio::spawn(async move {
            if let Err(e) = listener.join().await {
                error!(error = %e, "Change listener stopped; notifications are no longer delivered");
            }
        });

        let purge_task = storygram_ingress::spawn_purge_task(
            store,
            Duration::from_secs(config.stories.purge_interval_secs),
            shutdown.clone(),
        );

        let server_app = app.clone();
        let server = HttpServer::new(move || {
            let state = server_app.clone();
            App::new()
                .wrap(Cors::permissive())
                .wrap(middleware::Logger::default())
                .configure(move |cfg| state.configure(cfg))
        })
        .workers(config.server.workers.max(1))
        .disable_signals()
        .bind((config.server.host.as_str(), config.server.port));

        let server = match server {
            Ok(server) => server,
            Err(e) => {
                shutdown.cancel();
                return Err(e.into());
            }
        };
        let addrs = server.addrs();
        let server = server.run();
        let handle = server.handle();

        for addr in &addrs {
            info!("StoryGram listening on http://{}", addr);
        }

        Ok(RunningServer {
            addrs,
            handle,
            server_task: Some(tokio::spawn(server)),
            listener_task,
            purge_task,
            realtime: app.realtime,
            health: app.health,
            shutdown,
        })
    }
}

/// Handle to a started server
pub struct RunningServer {
    addrs: Vec<SocketAddr>,
    handle: ServerHandle,
    server_task: Option<JoinHandle<std::io::Result<()>>>,
    listener_task: JoinHandle<()>,
    purge_task: JoinHandle<()>,
    realtime: Arc<RealtimeState>,
    health: Arc<HealthState>,
    shutdown: CancellationToken,
}

impl RunningServer {
    /// Addresses the server is bound to
    #[must_use]
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Current change listener state
    #[must_use]
    pub fn listener_state(&self) -> ListenerState {
        *self.health.listener.borrow()
    }

    /// Number of live notification sessions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.health.registry.len()
    }

    /// Resolve when the HTTP server exits on its own
    ///
    /// # Errors
    /// The server's I/O error, or `InternalError` if its task panicked.
    pub async fn stopped(&mut self) -> Result<()> {
        let Some(task) = self.server_task.as_mut() else {
            return Ok(());
        };
        let result = task.await;
        self.server_task = None;
        match result {
            Ok(io_result) => io_result.map_err(Error::from),
            Err(e) => Err(Error::InternalError(format!("server task failed: {e}"))),
        }
    }

    /// Stop everything in order: refuse new sessions, let live sessions
    /// unregister and close, stop the HTTP server, then join background tasks.
    ///
    /// # Errors
    /// The server's I/O error if it failed while stopping.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down StoryGram services");
        self.shutdown.cancel();
        self.realtime.drain_sessions().await;
        self.handle.stop(true).await;

        let result = self.stopped().await;
        if let Err(e) = self.listener_task.await {
            error!(error = %e, "Listener supervisor failed");
        }
        if let Err(e) = self.purge_task.await {
            error!(error = %e, "Purge task failed");
        }
        info!("StoryGram stopped");
        result
    }
}
