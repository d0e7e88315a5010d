//! Progress tracking service.

use async_trait::async_trait;
use chrono::Utc;
use scribe_core::{ProgressState, SessionStatus, TaskId, Time};
use serde::{Deserialize, Serialize};

/// Read access to the progress of live sessions.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Get the progress of one session.
    async fn snapshot(&self, task_id: &TaskId) -> Option<ProgressSnapshot>;

    /// Tasks with a session that has not reached a terminal state.
    async fn active_tasks(&self) -> Vec<TaskId>;
}

/// A snapshot of session progress at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// When snapshot was taken
    pub timestamp: Time,

    /// Task the session follows
    pub task_id: TaskId,

    /// Session lifecycle status
    pub status: SessionStatus,

    /// Progress state at capture time
    pub state: ProgressState,

    /// Last message shown
    pub message: String,
}

impl ProgressSnapshot {
    /// Capture a snapshot now.
    pub fn capture(
        task_id: TaskId,
        status: SessionStatus,
        state: ProgressState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id,
            status,
            state,
            message: message.into(),
        }
    }

    /// Progress to show, rounded to one decimal.
    pub fn display_progress(&self) -> f64 {
        (self.state.simulated * 10.0).round() / 10.0
    }

    /// Time since the session started.
    pub fn elapsed(&self) -> chrono::Duration {
        self.timestamp - self.state.started_at
    }
}
