//! Scribe core data models.
//!
//! This crate defines the data structures shared by every layer of the
//! progress synchronization engine: task identity, job stages, the
//! per-session progress state, and the normalized authoritative update.

#![warn(missing_docs)]

// Core identities
mod id;

// Progress model
mod stage;
mod state;

// Authoritative updates and the wire format
mod update;
mod error;

// Re-exports
pub use id::TaskId;

pub use stage::{Stage, StageRate};
pub use state::{DisplayUpdate, ProgressState, SessionStatus};

pub use update::{
    decode_event, AuthoritativeUpdate, CompletionPayload, TaskStatusPayload, UpdateStatus,
    WireStatus,
};
pub use error::{Result, SyncError};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
