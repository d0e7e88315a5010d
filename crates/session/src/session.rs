//! Task session state machine.
//!
//! ```text
//! created --channel opened--> streaming --completed--> completed
//!                                 |      --error-----> failed
//!                                 |
//!                          channel failure
//!                                 v
//!                           disconnected --fallback completed--> completed
//!                                        --anything else------> failed
//! ```
//!
//! The push stream and the estimator tick both write the same progress
//! state. Every write happens under the session lock, and the ticker is
//! stopped and restarted around each authoritative update so the display
//! shows the confirmed value before any further simulated motion.

use crate::config::SessionConfig;
use crate::presenter::Presenter;
use scribe_channel::{ChannelEvent, ProgressChannel};
use scribe_core::{
    AuthoritativeUpdate, CompletionPayload, SessionStatus, SyncError, TaskId, UpdateStatus,
};
use scribe_progress::{ProgressEstimator, ProgressSnapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Job finished with a result
    Completed(CompletionPayload),
    /// Job or connection failed
    Failed(SyncError),
    /// Session was torn down by the caller
    Stopped,
}

impl SessionOutcome {
    /// Whether the job finished successfully.
    pub fn is_completed(&self) -> bool {
        matches!(self, SessionOutcome::Completed(_))
    }
}

/// Mutable per-session state, guarded by the session lock.
struct SessionInner {
    status: SessionStatus,
    estimator: ProgressEstimator,
    message: String,
    ticker: Option<JoinHandle<()>>,
    driver: Option<AbortHandle>,
    stopped: bool,
}

/// One job's session: identity, lifecycle, and progress.
pub struct TaskSession {
    task_id: TaskId,
    channel: Arc<dyn ProgressChannel>,
    presenter: Arc<dyn Presenter>,
    config: SessionConfig,
    inner: Arc<Mutex<SessionInner>>,
}

impl TaskSession {
    /// Create a session for a submitted task.
    pub fn new(
        task_id: TaskId,
        channel: Arc<dyn ProgressChannel>,
        presenter: Arc<dyn Presenter>,
        config: SessionConfig,
    ) -> Self {
        let estimator = ProgressEstimator::new(config.estimator.clone());
        let message = estimator.state().stage.display_message().to_string();

        Self {
            task_id,
            channel,
            presenter,
            config,
            inner: Arc::new(Mutex::new(SessionInner {
                status: SessionStatus::Created,
                estimator,
                message,
                ticker: None,
                driver: None,
                stopped: false,
            })),
        }
    }

    /// Task this session follows.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.status
    }

    /// Current progress.
    pub async fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock().await;
        ProgressSnapshot::capture(
            self.task_id.clone(),
            inner.status,
            inner.estimator.state().clone(),
            inner.message.clone(),
        )
    }

    /// Run the session on a background task.
    pub async fn spawn(self: &Arc<Self>) -> JoinHandle<SessionOutcome> {
        let handle = tokio::spawn(Arc::clone(self).run());
        self.inner.lock().await.driver = Some(handle.abort_handle());
        handle
    }

    /// Tear the session down.
    ///
    /// Cancels the tick timer, closes the channel, and leaves the progress
    /// state frozen at its last value. A session that has not reached an
    /// outcome reports [`SessionStatus::Stopped`] from then on.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if inner.stopped {
            return;
        }

        inner.stopped = true;
        if !inner.status.is_terminal() {
            inner.status = SessionStatus::Stopped;
        }
        stop_ticker(&mut inner);
        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }
        info!("Session for task {} stopped", self.task_id.short());
    }

    /// Follow the task until it completes or fails.
    pub async fn run(self: Arc<Self>) -> SessionOutcome {
        let mut subscription = match self.channel.subscribe(&self.task_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(
                    "Could not open progress stream for task {}: {}",
                    self.task_id.short(),
                    e
                );
                return self.handle_disconnect(e.into_transport()).await;
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if inner.stopped {
                return SessionOutcome::Stopped;
            }
            inner.status = SessionStatus::Streaming;
            self.start_ticker(&mut inner);
        }
        info!("Streaming progress for task {}", self.task_id.short());

        loop {
            match subscription.next().await {
                Some(ChannelEvent::Update(update)) => {
                    if let Some(outcome) = self.apply(update).await {
                        subscription.close();
                        return outcome;
                    }
                }
                Some(ChannelEvent::Failed(reason)) => {
                    subscription.close();
                    return self
                        .handle_disconnect(SyncError::ChannelTransport(reason))
                        .await;
                }
                None => {
                    subscription.close();
                    return self
                        .handle_disconnect(SyncError::ChannelTransport(
                            "progress stream closed".to_string(),
                        ))
                        .await;
                }
            }
        }
    }

    /// Apply one authoritative update. Returns the outcome if it ended the session.
    async fn apply(&self, update: AuthoritativeUpdate) -> Option<SessionOutcome> {
        if update.is_heartbeat() {
            debug!("Ignoring heartbeat for task {}", self.task_id.short());
            return None;
        }

        let mut inner = self.inner.lock().await;
        if inner.stopped {
            return Some(SessionOutcome::Stopped);
        }

        match update.status {
            UpdateStatus::Streaming => {
                stop_ticker(&mut inner);

                let value = update
                    .progress
                    .unwrap_or(inner.estimator.state().authoritative);
                let message = update.message.unwrap_or_else(|| inner.message.clone());

                inner.estimator.snap(value);
                inner.estimator.reclassify(value, &message);
                debug!(
                    "Task {} at {} ({}), target {}",
                    self.task_id.short(),
                    value,
                    inner.estimator.state().stage,
                    inner.estimator.state().target
                );

                let display = inner.estimator.display(message.clone());
                inner.message = message;
                self.presenter.on_progress(&display);

                self.start_ticker(&mut inner);
                None
            }
            UpdateStatus::Completed => {
                let payload = update.payload.unwrap_or_default();
                Some(self.finish_completed(&mut inner, payload))
            }
            UpdateStatus::Error => {
                let detail = update
                    .error
                    .unwrap_or_else(|| "Processing failed".to_string());
                Some(self.finish_failed(&mut inner, SyncError::Application(detail)))
            }
        }
    }

    /// Push channel is gone: one status fetch decides the outcome.
    async fn handle_disconnect(&self, cause: SyncError) -> SessionOutcome {
        let reason = cause.to_string();
        {
            let mut inner = self.inner.lock().await;
            if inner.stopped {
                return SessionOutcome::Stopped;
            }
            stop_ticker(&mut inner);
            inner.status = SessionStatus::Disconnected;
        }
        warn!(
            "Progress stream for task {} lost: {}",
            self.task_id.short(),
            reason
        );

        if !self.config.fallback_enabled {
            let mut inner = self.inner.lock().await;
            return self.finish_failed(&mut inner, SyncError::connection_lost(reason));
        }

        // Single attempt; no polling loop.
        let fetched = self.channel.fetch_status(&self.task_id).await;

        let mut inner = self.inner.lock().await;
        if inner.stopped {
            return SessionOutcome::Stopped;
        }

        match fetched {
            Ok(update) if update.status == UpdateStatus::Completed => {
                info!("Fallback fetch found task {} completed", self.task_id.short());
                let payload = update.payload.unwrap_or_default();
                self.finish_completed(&mut inner, payload)
            }
            Ok(update) => {
                let seen = update
                    .error
                    .or(update.message)
                    .unwrap_or_else(|| format!("{:?}", update.status).to_lowercase());
                self.finish_failed(
                    &mut inner,
                    SyncError::connection_lost(format!("{reason}; last known status: {seen}")),
                )
            }
            Err(e) => self.finish_failed(
                &mut inner,
                SyncError::connection_lost(format!("{reason}; status fetch failed: {e}")),
            ),
        }
    }

    fn finish_completed(
        &self,
        inner: &mut SessionInner,
        payload: CompletionPayload,
    ) -> SessionOutcome {
        stop_ticker(inner);
        inner.estimator.complete();
        inner.status = SessionStatus::Completed;

        let display = inner
            .estimator
            .display(inner.estimator.state().stage.display_message());
        inner.message = display.message.clone();
        self.presenter.on_progress(&display);
        self.presenter.on_completed(&payload);

        info!("Task {} completed", self.task_id.short());
        SessionOutcome::Completed(payload)
    }

    fn finish_failed(&self, inner: &mut SessionInner, error: SyncError) -> SessionOutcome {
        stop_ticker(inner);
        inner.status = SessionStatus::Failed;
        inner.message = error.to_string();
        self.presenter.on_failed(&error);

        warn!("Task {} failed: {}", self.task_id.short(), error);
        SessionOutcome::Failed(error)
    }

    /// Start the fixed-cadence estimator tick. The first tick fires one
    /// full interval from now.
    fn start_ticker(&self, inner: &mut SessionInner) {
        stop_ticker(inner);

        let state = Arc::clone(&self.inner);
        let presenter = Arc::clone(&self.presenter);
        let period = self.config.estimator.tick_interval;

        inner.ticker = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let mut inner = state.lock().await;
                if inner.stopped || inner.status != SessionStatus::Streaming {
                    break;
                }
                if let Some(update) = inner.estimator.tick() {
                    inner.message = update.message.clone();
                    presenter.on_progress(&update);
                }
            }
        }));
    }
}

fn stop_ticker(inner: &mut SessionInner) {
    if let Some(ticker) = inner.ticker.take() {
        ticker.abort();
    }
}

impl std::fmt::Debug for TaskSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSession")
            .field("task_id", &self.task_id)
            .finish()
    }
}
