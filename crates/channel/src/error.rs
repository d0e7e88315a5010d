//! Client error type.

use scribe_core::SyncError;

/// Result alias for backend calls.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response carrying the server's detail string
    #[error("Server returned {status}: {detail}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Detail from the response body
        detail: String,
    },

    /// Task unknown to the server
    #[error("Task not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response body did not carry a usable status
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Filename refused before any request was made
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// Event stream could not be opened or broke
    #[error("Stream error: {0}")]
    Stream(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Human-readable detail, without the variant prefix for server rejections.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Rejected { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    /// Map to a submission error.
    pub fn into_submission(self) -> SyncError {
        SyncError::submission(self.detail())
    }

    /// Map to a channel transport error.
    pub fn into_transport(self) -> SyncError {
        SyncError::ChannelTransport(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_detail_is_verbatim() {
        let err = ClientError::Rejected {
            status: 500,
            detail: "Processing failed: unsupported URL".to_string(),
        };
        assert_eq!(err.detail(), "Processing failed: unsupported URL");
        assert_eq!(
            err.into_submission(),
            SyncError::submission("Processing failed: unsupported URL")
        );
    }

    #[test]
    fn test_transport_mapping() {
        let err = ClientError::Stream("connection reset".to_string());
        assert!(matches!(err.into_transport(), SyncError::ChannelTransport(msg) if msg.contains("connection reset")));
    }
}
