//! Channel abstractions.
//!
//! A [`ProgressChannel`] pairs a push subscription with a one-shot status
//! fetch. Both are normalized into [`AuthoritativeUpdate`] so sessions do
//! not care which transport delivered a value.

use crate::client::Submission;
use crate::error::Result;
use async_trait::async_trait;
use scribe_core::{AuthoritativeUpdate, TaskId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Push subscription plus pull fallback for one backend.
#[async_trait]
pub trait ProgressChannel: Send + Sync {
    /// Open the push subscription for a task.
    async fn subscribe(&self, task_id: &TaskId) -> Result<Subscription>;

    /// Fetch the current status once.
    async fn fetch_status(&self, task_id: &TaskId) -> Result<AuthoritativeUpdate>;
}

/// Submission endpoint.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Submit a source URL and receive the task identity.
    async fn submit(&self, source_url: &str) -> scribe_core::Result<Submission>;
}

/// Event delivered by a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Normalized authoritative update
    Update(AuthoritativeUpdate),
    /// Transport-level failure; the subscription is finished
    Failed(String),
}

/// Live push subscription.
///
/// Dropping or closing the subscription stops the task feeding it.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver fed by a background pump task.
    pub fn new(events: mpsc::UnboundedReceiver<ChannelEvent>, pump: JoinHandle<()>) -> Self {
        Self {
            events,
            pump: Some(pump),
        }
    }

    /// Wrap a receiver fed by someone else.
    pub fn detached(events: mpsc::UnboundedReceiver<ChannelEvent>) -> Self {
        Self { events, pump: None }
    }

    /// Next event, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Close the subscription.
    pub fn close(&mut self) {
        if let Some(pump) = self.pump.take() {
            debug!("Closing progress subscription");
            pump.abort();
        }
        self.events.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pumped", &self.pump.is_some())
            .finish()
    }
}
