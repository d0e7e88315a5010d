//! Error taxonomy for the synchronization engine.

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// The submission was rejected; no session is created
    #[error("Submission failed: {detail}")]
    Submission {
        /// Human-readable detail from the server or local validation
        detail: String,
    },

    /// The push channel failed at the transport level
    #[error("Channel transport error: {0}")]
    ChannelTransport(String),

    /// The server reported the job as failed
    #[error("{0}")]
    Application(String),

    /// An event payload could not be parsed
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The push channel dropped and the fallback fetch could not confirm completion
    #[error("Connection lost: {detail}")]
    ConnectionLost {
        /// What the fallback fetch saw
        detail: String,
    },
}

impl SyncError {
    /// Create a submission error.
    pub fn submission(detail: impl Into<String>) -> Self {
        SyncError::Submission {
            detail: detail.into(),
        }
    }

    /// Create a connection-lost error.
    pub fn connection_lost(detail: impl Into<String>) -> Self {
        SyncError::ConnectionLost {
            detail: detail.into(),
        }
    }

    /// Whether the error ends the session.
    ///
    /// Malformed events are dropped and transport errors go through the
    /// fallback path; neither ends a session on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncError::Application(_) | SyncError::ConnectionLost { .. }
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedEvent(err.to_string())
    }
}
