//! Progress state and session lifecycle.

use crate::stage::Stage;
use crate::Time;
use serde::{Deserialize, Serialize};

/// Progress for one session: the confirmed value and the simulated value
/// shown between confirmations.
///
/// Owned by a single session and mutated by a single writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Last value confirmed by the server, non-decreasing
    pub authoritative: f64,

    /// Locally advanced display value, never above `target`
    pub simulated: f64,

    /// Ceiling the simulator may approach until the next update
    pub target: f64,

    /// Current stage
    pub stage: Stage,

    /// Wall-clock anchor for the session, set once
    pub started_at: Time,
}

impl ProgressState {
    /// Initial state for a new session.
    pub fn new(started_at: Time) -> Self {
        Self {
            authoritative: 0.0,
            simulated: 0.0,
            target: Stage::Preparing.ceiling(),
            stage: Stage::Preparing,
            started_at,
        }
    }

    /// Remaining room between the simulated value and the ceiling.
    pub fn headroom(&self) -> f64 {
        (self.target - self.simulated).max(0.0)
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new(chrono::Utc::now())
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session constructed, channel not yet open
    Created,
    /// Push channel open and delivering updates
    Streaming,
    /// Job finished successfully (terminal)
    Completed,
    /// Job or connection failed (terminal)
    Failed,
    /// Push channel dropped, fallback fetch pending
    Disconnected,
    /// Torn down by the caller before reaching an outcome (terminal)
    Stopped,
}

impl SessionStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Stopped
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Created => write!(f, "created"),
            SessionStatus::Streaming => write!(f, "streaming"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Disconnected => write!(f, "disconnected"),
            SessionStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// A display-worthy change handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayUpdate {
    /// Progress to show (0-100)
    pub progress: f64,

    /// Message to show
    pub message: String,
}

impl DisplayUpdate {
    /// Create a display update.
    pub fn new(progress: f64, message: impl Into<String>) -> Self {
        Self {
            progress,
            message: message.into(),
        }
    }
}
