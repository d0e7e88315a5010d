//! Progress line on stdout.

use scribe_core::{CompletionPayload, DisplayUpdate, SyncError};
use scribe_session::Presenter;
use std::io::Write;
use std::sync::Mutex;

const BAR_WIDTH: usize = 30;

/// Presenter that redraws a single progress line.
#[derive(Debug, Default)]
pub struct TerminalPresenter {
    /// Whether a progress line is currently open
    open: Mutex<bool>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish_line(&self) {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());
        if *open {
            println!();
            *open = false;
        }
    }
}

impl Presenter for TerminalPresenter {
    fn on_progress(&self, update: &DisplayUpdate) {
        let mut open = self.open.lock().unwrap_or_else(|e| e.into_inner());

        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r\x1b[2K{}", render(update));
        let _ = stdout.flush();
        *open = true;
    }

    fn on_completed(&self, result: &CompletionPayload) {
        self.finish_line();
        if let Some(title) = &result.video_title {
            println!("Done: {title}");
        }
    }

    fn on_failed(&self, _error: &SyncError) {
        // The caller reports the error itself.
        self.finish_line();
    }

    fn on_reset(&self) {
        self.finish_line();
    }
}

/// Render one progress line.
fn render(update: &DisplayUpdate) -> String {
    let progress = update.progress.clamp(0.0, 100.0);
    let filled = ((progress / 100.0) * BAR_WIDTH as f64).round() as usize;

    format!(
        "[{}{}] {:>5.1}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress,
        update.message
    )
}
