//! HTTP client for the transcription backend.

use crate::channel::JobSubmitter;
use crate::error::{ClientError, Result};
use crate::files::{transcript_filename, validate_filename};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response, StatusCode};
use scribe_core::{AuthoritativeUpdate, TaskId, TaskStatusPayload};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backend client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL
    pub base_url: String,
    /// Timeout for one-shot requests; the event stream has none
    pub request_timeout: Duration,
    /// Longest silence tolerated on the event stream before it counts as dropped
    pub stream_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout: Duration::from_secs(30),
            // Two missed 30s heartbeats
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the event stream idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }
}

/// Response to a job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Server-assigned task identity
    pub task_id: TaskId,
    /// Server message
    #[serde(default)]
    pub message: String,
}

/// Backend activity counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveTasks {
    /// Jobs currently running
    pub active_tasks: usize,
    /// Distinct URLs being processed
    pub processing_urls: usize,
    /// Running task IDs
    pub task_ids: Vec<TaskId>,
}

/// Download metadata for a finished task.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptFile {
    /// Filename to request and save under
    pub filename: String,
    /// Source title, when known
    pub title: Option<String>,
}

/// Transcription backend client.
#[derive(Clone)]
pub struct ApiClient {
    /// Client for one-shot requests
    client: Client,

    /// Client for the event stream (no overall timeout)
    stream_client: Client,

    /// Backend base URL, without trailing slash
    base_url: String,

    /// Event stream silence limit
    idle_timeout: Duration,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: ClientBuilder::new()
                .timeout(config.request_timeout)
                .build()
                .unwrap_or_default(),
            stream_client: ClientBuilder::new()
                .connect_timeout(config.request_timeout)
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            idle_timeout: config.stream_idle_timeout,
        }
    }

    /// Backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Longest silence tolerated on the event stream.
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Submit a source URL for processing.
    pub async fn submit_url(&self, source_url: &str) -> Result<Submission> {
        debug!("Submitting {}", source_url);

        let response = self
            .client
            .post(self.url("/api/process-video"))
            .form(&[("url", source_url)])
            .send()
            .await?;

        let submission: Submission = check(response).await?.json().await?;
        info!("Task {} created: {}", submission.task_id, submission.message);
        Ok(submission)
    }

    /// Fetch the raw status object of a task.
    pub async fn fetch_status(&self, task_id: &TaskId) -> Result<TaskStatusPayload> {
        let response = self
            .client
            .get(self.url(&format!("/api/task-status/{task_id}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(task_id.to_string()));
        }

        Ok(check(response).await?.json().await?)
    }

    /// Fetch the status of a task as an authoritative update.
    pub async fn fetch_update(&self, task_id: &TaskId) -> Result<AuthoritativeUpdate> {
        let payload = self.fetch_status(task_id).await?;
        payload
            .into_update()
            .map_err(|e| ClientError::Malformed(e.to_string()))?
            .ok_or_else(|| ClientError::Malformed("status response was a heartbeat".to_string()))
    }

    /// Request for the server-sent progress stream of a task.
    pub fn stream_request(&self, task_id: &TaskId) -> RequestBuilder {
        self.stream_client
            .get(self.url(&format!("/api/task-stream/{task_id}")))
            .header(ACCEPT, "text/event-stream")
    }

    /// Cancel and delete a task on the server.
    pub async fn cancel(&self, task_id: &TaskId) -> Result<String> {
        let response = self
            .client
            .delete(self.url(&format!("/api/task/{task_id}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(task_id.to_string()));
        }

        #[derive(Deserialize)]
        struct CancelResponse {
            #[serde(default)]
            message: String,
        }

        let body: CancelResponse = check(response).await?.json().await?;
        info!("Task {} cancelled", task_id);
        Ok(body.message)
    }

    /// Backend activity counters.
    pub async fn active_tasks(&self) -> Result<ActiveTasks> {
        let response = self
            .client
            .get(self.url("/api/tasks/active"))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    /// Download a file by name.
    pub async fn download(&self, filename: &str) -> Result<Vec<u8>> {
        validate_filename(filename)?;

        let response = self
            .client
            .get(self.url(&format!("/api/download/{filename}")))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(filename.to_string()));
        }

        let bytes = check(response).await?.bytes().await?;
        debug!("Downloaded {} ({} bytes)", filename, bytes.len());
        Ok(bytes.to_vec())
    }

    /// Resolve the transcript filename of a task.
    pub async fn transcript_file(&self, task_id: &TaskId) -> Result<TranscriptFile> {
        let status = self.fetch_status(task_id).await?;
        let filename = transcript_filename(&status).ok_or_else(|| {
            ClientError::Malformed(format!("task {task_id} has no transcript file yet"))
        })?;

        Ok(TranscriptFile {
            filename,
            title: status.video_title,
        })
    }

    /// Download the transcript of a task into a directory.
    pub async fn save_transcript(&self, task_id: &TaskId, dir: &Path) -> Result<PathBuf> {
        let file = self.transcript_file(task_id).await?;
        let bytes = self.download(&file.filename).await?;
        write_file(dir, &file.filename, &bytes).await
    }

    /// Check if the backend is reachable.
    pub async fn health_check(&self) -> bool {
        match self.client.get(self.url("/api/tasks/active")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Backend health check failed: {}", e);
                false
            }
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl JobSubmitter for ApiClient {
    async fn submit(&self, source_url: &str) -> scribe_core::Result<Submission> {
        self.submit_url(source_url)
            .await
            .map_err(ClientError::into_submission)
    }
}

/// Turn a non-success response into [`ClientError::Rejected`].
async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Rejected {
        status: status.as_u16(),
        detail: error_detail(&body),
    })
}

/// Extract the `detail` field of an error body.
///
/// Validation failures carry a list of `{msg}` objects instead of a string.
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<ErrorBody>(body).map(|b| b.detail) {
        Ok(serde_json::Value::String(detail)) => detail,
        Ok(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .collect::<Vec<_>>()
            .join("; "),
        Ok(other) => other.to_string(),
        Err(_) if body.trim().is_empty() => "no detail".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

/// Write downloaded bytes under `dir`.
async fn write_file(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
    validate_filename(filename)?;
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(filename);
    tokio::fs::write(&path, bytes).await?;
    info!("Saved {}", path.display());
    Ok(path)
}
