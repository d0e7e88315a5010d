//! Authoritative updates and the status wire format.
//!
//! The push stream and the status endpoint share one JSON shape. Both are
//! normalized into [`AuthoritativeUpdate`] before they reach a session.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

/// Status value as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireStatus {
    /// Job in flight. The backend spells this `processing`.
    #[serde(alias = "processing")]
    Streaming,
    /// Job finished
    Completed,
    /// Job failed
    Error,
    /// Anything else
    #[serde(other)]
    Unknown,
}

/// Raw status object from the event stream or the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusPayload {
    /// Event kind; only `heartbeat` is meaningful
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Job status
    #[serde(default)]
    pub status: Option<WireStatus>,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: Option<f64>,

    /// Progress message
    #[serde(default)]
    pub message: Option<String>,

    /// Transcript text (set on completion)
    #[serde(default)]
    pub script: Option<String>,

    /// Source title (set on completion)
    #[serde(default)]
    pub video_title: Option<String>,

    /// Error detail (set on failure)
    #[serde(default)]
    pub error: Option<String>,

    /// Server-side path of the transcript file
    #[serde(default)]
    pub script_path: Option<String>,

    /// Filename-safe title
    #[serde(default)]
    pub safe_title: Option<String>,

    /// Short task prefix used by the server in filenames
    #[serde(default)]
    pub short_id: Option<String>,

    /// Submitted source URL
    #[serde(default)]
    pub url: Option<String>,
}

impl TaskStatusPayload {
    /// Whether this is a channel keepalive.
    pub fn is_heartbeat(&self) -> bool {
        self.kind.as_deref() == Some("heartbeat")
    }

    /// Normalize into an authoritative update.
    ///
    /// Heartbeats yield `Ok(None)`. A payload with no recognizable status
    /// is a [`SyncError::MalformedEvent`].
    pub fn into_update(self) -> Result<Option<AuthoritativeUpdate>> {
        if self.is_heartbeat() {
            return Ok(None);
        }

        let status = self
            .status
            .ok_or_else(|| SyncError::MalformedEvent("missing status".to_string()))?;

        let update = match status {
            WireStatus::Streaming => AuthoritativeUpdate {
                status: UpdateStatus::Streaming,
                progress: self.progress,
                message: self.message,
                payload: None,
                error: None,
            },
            WireStatus::Completed => AuthoritativeUpdate {
                status: UpdateStatus::Completed,
                progress: self.progress,
                message: self.message,
                payload: Some(CompletionPayload {
                    script: self.script.unwrap_or_default(),
                    video_title: self.video_title,
                    script_path: self.script_path,
                    safe_title: self.safe_title,
                }),
                error: None,
            },
            WireStatus::Error => {
                let detail = self
                    .error
                    .or_else(|| self.message.clone())
                    .unwrap_or_else(|| "Processing failed".to_string());
                AuthoritativeUpdate {
                    status: UpdateStatus::Error,
                    progress: self.progress,
                    message: self.message,
                    payload: None,
                    error: Some(detail),
                }
            }
            WireStatus::Unknown => {
                return Err(SyncError::MalformedEvent(
                    "unrecognized status".to_string(),
                ))
            }
        };

        Ok(Some(update))
    }
}

/// Decode one event-stream `data:` payload.
///
/// Empty payloads and heartbeats yield `Ok(None)`.
pub fn decode_event(data: &str) -> Result<Option<AuthoritativeUpdate>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let payload: TaskStatusPayload = serde_json::from_str(data)?;
    payload.into_update()
}

/// Normalized status of an authoritative update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    /// Job still running
    Streaming,
    /// Job finished
    Completed,
    /// Job failed
    Error,
}

/// Final result of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    /// Transcript text
    pub script: String,

    /// Source title
    pub video_title: Option<String>,

    /// Server-side transcript path
    pub script_path: Option<String>,

    /// Filename-safe title
    pub safe_title: Option<String>,
}

/// A progress or status event from the system performing the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeUpdate {
    /// Normalized status
    pub status: UpdateStatus,

    /// Confirmed progress, if reported
    pub progress: Option<f64>,

    /// Progress message, if reported
    pub message: Option<String>,

    /// Final result (completed only)
    pub payload: Option<CompletionPayload>,

    /// Error detail (error only)
    pub error: Option<String>,
}

impl AuthoritativeUpdate {
    /// A running-job update.
    pub fn progress(progress: f64, message: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Streaming,
            progress: Some(progress),
            message: Some(message.into()),
            payload: None,
            error: None,
        }
    }

    /// A synthetic keepalive carrying no progress information.
    pub fn heartbeat() -> Self {
        Self {
            status: UpdateStatus::Streaming,
            progress: None,
            message: None,
            payload: None,
            error: None,
        }
    }

    /// A completion update.
    pub fn completed(payload: CompletionPayload) -> Self {
        Self {
            status: UpdateStatus::Completed,
            progress: Some(100.0),
            message: Some("Processing completed!".to_string()),
            payload: Some(payload),
            error: None,
        }
    }

    /// A failure update.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Error,
            progress: None,
            message: None,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Whether this update carries nothing but liveness.
    pub fn is_heartbeat(&self) -> bool {
        self.status == UpdateStatus::Streaming && self.progress.is_none() && self.message.is_none()
    }

    /// Whether this update ends the job.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, UpdateStatus::Completed | UpdateStatus::Error)
    }
}
