//! Change listener
//!
//! Holds exactly one subscription to the store's insert stream and turns
//! every inserted story into a broadcast. State transitions:
//!
//! ```text
//! Disconnected -> Subscribing -> Streaming -> (transient error) Subscribing
//!                     |                                   |
//!                     +-------- retry budget spent -------+--> Failed
//! ```
//!
//! A setup error on the very first subscription is fatal immediately; the
//! supervisor sees it through [`ListenerHandle::wait_started`].

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use storygram_common::config::ListenerConfig;
use storygram_common::error::{Error, Result};
use storygram_common::types::StoryNotification;
use storygram_store::{ChangeEvent, ChangeStream, ChangeType, StoryStore};

use crate::registry::SubscriberRegistry;

/// Lifecycle state of the change listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    Disconnected,
    Subscribing,
    Streaming,
    Failed,
}

/// How a streaming session ended
enum StreamOutcome {
    Cancelled,
    Interrupted(Error),
}

/// Forwards store inserts to the subscriber registry
pub struct ChangeListener {
    store: Arc<dyn StoryStore>,
    registry: Arc<SubscriberRegistry>,
    config: ListenerConfig,
    state: watch::Sender<ListenerState>,
    shutdown: CancellationToken,
}

impl ChangeListener {
    #[must_use]
    pub fn new(
        store: Arc<dyn StoryStore>,
        registry: Arc<SubscriberRegistry>,
        config: ListenerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Disconnected);
        Self {
            store,
            registry,
            config,
            state,
            shutdown,
        }
    }

    /// Follow state changes before the listener is spawned
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    /// Run the listener on its own task
    #[must_use]
    pub fn spawn(self) -> ListenerHandle {
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run());
        ListenerHandle { state, task }
    }

    /// Drive the listener until cancellation or terminal failure
    ///
    /// # Errors
    /// The setup error when the first subscription fails, or `StreamError`
    /// once the retry budget is exhausted.
    pub async fn run(self) -> Result<()> {
        let mut consecutive_failures: u32 = 0;
        let mut ever_streamed = false;

        loop {
            self.set_state(ListenerState::Subscribing);

            let subscribed = tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.stop();
                    return Ok(());
                }
                result = self.store.stream_inserts() => result,
            };

            let failure = match subscribed {
                Ok(mut stream) => {
                    // A working subscription refills the budget
                    ever_streamed = true;
                    consecutive_failures = 0;
                    self.set_state(ListenerState::Streaming);
                    info!("Change listener streaming story inserts");

                    match self.consume(&mut stream).await {
                        StreamOutcome::Cancelled => {
                            self.stop();
                            return Ok(());
                        }
                        StreamOutcome::Interrupted(e) => e,
                    }
                }
                Err(e) if !ever_streamed => {
                    self.set_state(ListenerState::Failed);
                    error!(error = %e, "Change listener could not subscribe at startup");
                    return Err(e);
                }
                Err(e) => e,
            };

            consecutive_failures += 1;
            if consecutive_failures > self.config.max_retries {
                self.set_state(ListenerState::Failed);
                error!(
                    attempts = consecutive_failures,
                    max_retries = self.config.max_retries,
                    error = %failure,
                    "Change listener retry budget exhausted"
                );
                return Err(Error::StreamError(format!(
                    "retry budget exhausted after {consecutive_failures} attempts: {failure}"
                )));
            }

            let delay = self.backoff_delay(consecutive_failures);
            warn!(
                attempt = consecutive_failures,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %failure,
                "Change stream interrupted, resubscribing"
            );

            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.stop();
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn consume(&self, stream: &mut ChangeStream) -> StreamOutcome {
        loop {
            let next = tokio::select! {
                () = self.shutdown.cancelled() => return StreamOutcome::Cancelled,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(event)) => self.handle_event(&event),
                Some(Err(e)) => return StreamOutcome::Interrupted(e),
                None => {
                    return StreamOutcome::Interrupted(Error::StreamError(
                        "change stream closed".to_string(),
                    ))
                }
            }
        }
    }

    fn handle_event(&self, event: &ChangeEvent) {
        if event.change_type != ChangeType::Insert {
            trace!(event_id = %event.id, change = ?event.change_type, "Ignoring non-insert change");
            return;
        }

        let story = match event.decode_story() {
            Ok(story) => story,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Skipping undecodable change event");
                return;
            }
        };

        let notification = Arc::new(StoryNotification::new_story(&story));
        let report = self.registry.broadcast(&notification);
        debug!(
            story_id = %story.id,
            delivered = report.delivered,
            failed = report.failures.len(),
            "Broadcast new story"
        );
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap
    )]
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let delay = self.config.base_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.config.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
    }

    fn stop(&self) {
        self.set_state(ListenerState::Disconnected);
        info!("Change listener stopped");
    }
}

/// Supervisor's view of a running listener
pub struct ListenerHandle {
    state: watch::Receiver<ListenerState>,
    task: JoinHandle<Result<()>>,
}

impl ListenerHandle {
    /// Current state
    #[must_use]
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// A receiver that follows state changes
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    /// Wait until the first subscription either streams or fails
    ///
    /// # Errors
    /// `StreamError` when the listener failed before streaming.
    pub async fn wait_started(&mut self) -> Result<()> {
        let state = self
            .state
            .wait_for(|s| matches!(s, ListenerState::Streaming | ListenerState::Failed))
            .await
            .map(|s| *s)
            .map_err(|_| Error::StreamError("change listener exited".to_string()))?;

        if state == ListenerState::Failed {
            Err(Error::StreamError("change listener failed to subscribe".to_string()))
        } else {
            Ok(())
        }
    }

    /// Wait for the listener task to finish
    ///
    /// # Errors
    /// The listener's terminal error, or `InternalError` if the task panicked.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| Error::InternalError(format!("change listener task failed: {e}")))?
    }
}
