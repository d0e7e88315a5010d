//! Session management.
//!
//! A [`TaskSession`] follows one job: it reconciles authoritative updates
//! from a [`ProgressChannel`](scribe_channel::ProgressChannel) with the
//! locally simulated progress and reports display changes to a
//! [`Presenter`]. The [`SessionController`] creates sessions from
//! submissions and keeps them keyed by task.

#![warn(missing_docs)]

pub mod config;
pub mod presenter;
pub mod session;
pub mod controller;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SessionConfig;
pub use presenter::{Presenter, TracingPresenter};
pub use session::{SessionOutcome, TaskSession};
pub use controller::{SessionController, SessionHandle};
