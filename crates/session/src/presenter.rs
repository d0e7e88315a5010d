//! Presentation callbacks.

use scribe_core::{CompletionPayload, DisplayUpdate, SyncError};
use tracing::{error, info};

/// Receives display changes and terminal results of a session.
///
/// Callbacks run while the session state is locked and must not block.
pub trait Presenter: Send + Sync {
    /// Progress or message changed.
    fn on_progress(&self, update: &DisplayUpdate);

    /// The job finished.
    fn on_completed(&self, result: &CompletionPayload);

    /// The job or the connection failed.
    fn on_failed(&self, error: &SyncError);

    /// A new submission is starting; clear any previous error.
    fn on_reset(&self) {}
}

/// Presenter that writes to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn on_progress(&self, update: &DisplayUpdate) {
        info!("{:>5.1}% {}", update.progress, update.message);
    }

    fn on_completed(&self, result: &CompletionPayload) {
        info!(
            "Completed: {} ({} chars)",
            result.video_title.as_deref().unwrap_or("untitled"),
            result.script.chars().count()
        );
    }

    fn on_failed(&self, error: &SyncError) {
        error!("Failed: {}", error);
    }
}
