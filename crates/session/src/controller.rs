//! Session controller: submissions in, running sessions out.

use crate::config::SessionConfig;
use crate::presenter::Presenter;
use crate::session::{SessionOutcome, TaskSession};
use async_trait::async_trait;
use scribe_channel::{JobSubmitter, ProgressChannel};
use scribe_core::{Result, SyncError, TaskId};
use scribe_progress::{ProgressSnapshot, ProgressTracker};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info};

/// Running session plus its driver task.
#[derive(Debug)]
pub struct SessionHandle {
    session: Arc<TaskSession>,
    join: JoinHandle<std::result::Result<SessionOutcome, JoinError>>,
}

impl SessionHandle {
    /// Task the session follows.
    pub fn task_id(&self) -> &TaskId {
        self.session.task_id()
    }

    /// The session itself.
    pub fn session(&self) -> &Arc<TaskSession> {
        &self.session
    }

    /// Wait for the session to end.
    pub async fn wait(self) -> SessionOutcome {
        match self.join.await.and_then(|joined| joined) {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => SessionOutcome::Stopped,
            Err(e) => {
                error!("Session for task {} panicked: {}", self.session.task_id(), e);
                SessionOutcome::Stopped
            }
        }
    }
}

/// Creates sessions from submissions and keeps the live ones keyed by task.
///
/// A session is forgotten as soon as it ends; its final state stays
/// reachable through the [`SessionHandle`].
pub struct SessionController {
    submitter: Arc<dyn JobSubmitter>,
    channel: Arc<dyn ProgressChannel>,
    presenter: Arc<dyn Presenter>,
    config: SessionConfig,
    sessions: Arc<Mutex<HashMap<TaskId, Arc<TaskSession>>>>,
}

impl SessionController {
    /// Create a new controller with default configuration.
    pub fn new(
        submitter: Arc<dyn JobSubmitter>,
        channel: Arc<dyn ProgressChannel>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self::with_config(submitter, channel, presenter, SessionConfig::default())
    }

    /// Create a new controller.
    pub fn with_config(
        submitter: Arc<dyn JobSubmitter>,
        channel: Arc<dyn ProgressChannel>,
        presenter: Arc<dyn Presenter>,
        config: SessionConfig,
    ) -> Self {
        Self {
            submitter,
            channel,
            presenter,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Submit a source URL and start following the new task.
    ///
    /// A rejected submission creates no session.
    pub async fn submit(&self, source_url: &str) -> Result<SessionHandle> {
        self.presenter.on_reset();

        let source_url = source_url.trim();
        validate_source_url(source_url).map_err(|e| {
            self.presenter.on_failed(&e);
            e
        })?;

        let submission = match self.submitter.submit(source_url).await {
            Ok(submission) => submission,
            Err(e) => {
                error!("Submission of {} failed: {}", source_url, e);
                self.presenter.on_failed(&e);
                return Err(e);
            }
        };

        info!(
            "Submitted {} as task {}",
            source_url,
            submission.task_id.short()
        );
        Ok(self.attach(submission.task_id).await)
    }

    /// Start following an already submitted task.
    ///
    /// An existing session for the same task is stopped first.
    pub async fn attach(&self, task_id: TaskId) -> SessionHandle {
        let session = Arc::new(TaskSession::new(
            task_id.clone(),
            Arc::clone(&self.channel),
            Arc::clone(&self.presenter),
            self.config.clone(),
        ));

        let previous = self
            .sessions
            .lock()
            .await
            .insert(task_id.clone(), Arc::clone(&session));
        if let Some(previous) = previous {
            debug!("Replacing session for task {}", task_id.short());
            previous.stop().await;
        }

        let driver = session.spawn().await;
        let sessions = Arc::clone(&self.sessions);
        let tracked = Arc::clone(&session);

        let join = tokio::spawn(async move {
            let joined = driver.await;

            let mut map = sessions.lock().await;
            if map
                .get(tracked.task_id())
                .is_some_and(|current| Arc::ptr_eq(current, &tracked))
            {
                map.remove(tracked.task_id());
                debug!("Forgot finished session for task {}", tracked.task_id().short());
            }
            joined
        });

        SessionHandle { session, join }
    }

    /// Stop and forget the session of a task. Returns whether one existed.
    pub async fn stop(&self, task_id: &TaskId) -> bool {
        let session = self.sessions.lock().await.remove(task_id);
        match session {
            Some(session) => {
                session.stop().await;
                true
            }
            None => false,
        }
    }

    /// Stop every session.
    pub async fn stop_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.stop().await;
        }
    }
}

#[async_trait]
impl ProgressTracker for SessionController {
    async fn snapshot(&self, task_id: &TaskId) -> Option<ProgressSnapshot> {
        let session = self.sessions.lock().await.get(task_id).cloned()?;
        Some(session.snapshot().await)
    }

    async fn active_tasks(&self) -> Vec<TaskId> {
        let sessions: Vec<_> = self.sessions.lock().await.values().cloned().collect();

        let mut active = Vec::new();
        for session in sessions {
            if !session.status().await.is_terminal() {
                active.push(session.task_id().clone());
            }
        }
        active
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("config", &self.config)
            .finish()
    }
}

fn validate_source_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(SyncError::submission("a video URL is required"));
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(SyncError::submission(format!(
            "{url} is not an http(s) URL"
        )));
    }
    Ok(())
}
