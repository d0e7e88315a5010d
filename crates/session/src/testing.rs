//! Test doubles for sessions.

use crate::presenter::Presenter;
use async_trait::async_trait;
use scribe_channel::{
    ChannelEvent, ClientError, JobSubmitter, ProgressChannel, Submission, Subscription,
};
use scribe_core::{AuthoritativeUpdate, CompletionPayload, DisplayUpdate, SyncError, TaskId};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Let spawned tasks run without advancing paused time.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Shared call counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted channel: each subscribe takes the next queued stream.
#[derive(Default)]
pub struct MockChannel {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<ChannelEvent>>>,
    fallback: Mutex<VecDeque<Result<AuthoritativeUpdate, ClientError>>>,
    fetches: Counter,
}

impl MockChannel {
    /// Channel with one scripted stream.
    pub fn new() -> (Self, mpsc::UnboundedSender<ChannelEvent>) {
        let channel = Self::default();
        let tx = channel.add_stream();
        (channel, tx)
    }

    /// Channel whose subscribe always fails.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Queue another stream for the next subscribe.
    pub fn add_stream(&self) -> mpsc::UnboundedSender<ChannelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }

    /// Queue a fallback fetch result.
    pub fn with_fallback(self, result: Result<AuthoritativeUpdate, ClientError>) -> Self {
        self.fallback.lock().unwrap().push_back(result);
        self
    }

    pub fn fetch_counter(&self) -> Counter {
        self.fetches.clone()
    }
}

#[async_trait]
impl ProgressChannel for MockChannel {
    async fn subscribe(&self, _task_id: &TaskId) -> scribe_channel::Result<Subscription> {
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .map(Subscription::detached)
            .ok_or_else(|| ClientError::Stream("connection refused".to_string()))
    }

    async fn fetch_status(&self, _task_id: &TaskId) -> scribe_channel::Result<AuthoritativeUpdate> {
        self.fetches.bump();
        self.fallback
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Stream("connection refused".to_string())))
    }
}

/// Presenter call, as recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    Progress(DisplayUpdate),
    Completed(CompletionPayload),
    Failed(SyncError),
    Reset,
}

/// Presenter that records every call.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<f64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Progress(update) => Some(update.progress),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> Vec<CompletionPayload> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Completed(payload) => Some(payload),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<SyncError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PresenterEvent::Failed(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: PresenterEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn on_progress(&self, update: &DisplayUpdate) {
        self.push(PresenterEvent::Progress(update.clone()));
    }

    fn on_completed(&self, result: &CompletionPayload) {
        self.push(PresenterEvent::Completed(result.clone()));
    }

    fn on_failed(&self, error: &SyncError) {
        self.push(PresenterEvent::Failed(error.clone()));
    }

    fn on_reset(&self) {
        self.push(PresenterEvent::Reset);
    }
}

/// Submitter handing out sequential task IDs, or rejecting everything.
#[derive(Debug, Default)]
pub struct StubSubmitter {
    calls: Counter,
    reject: Option<String>,
}

impl StubSubmitter {
    pub fn rejecting(detail: &str) -> Self {
        Self {
            calls: Counter::default(),
            reject: Some(detail.to_string()),
        }
    }

    pub fn call_counter(&self) -> Counter {
        self.calls.clone()
    }
}

#[async_trait]
impl JobSubmitter for StubSubmitter {
    async fn submit(&self, _source_url: &str) -> scribe_core::Result<Submission> {
        self.calls.bump();
        if let Some(detail) = &self.reject {
            return Err(SyncError::submission(detail.clone()));
        }

        Ok(Submission {
            task_id: TaskId::new(format!("task-{}", self.calls.get())),
            message: "Task created. Processing...".to_string(),
        })
    }
}
