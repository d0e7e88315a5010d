//! Progress channel and backend client.
//!
//! This crate owns everything that talks to the transcription backend:
//! job submission, the server-sent progress stream, the one-shot status
//! fetch used as fallback, and transcript downloads.

#![warn(missing_docs)]

pub mod error;
pub mod channel;
pub mod client;
pub mod sse;
pub mod files;

pub use error::{ClientError, Result};
pub use channel::{ChannelEvent, JobSubmitter, ProgressChannel, Subscription};
pub use client::{ActiveTasks, ApiClient, ClientConfig, Submission, TranscriptFile};
pub use sse::SseProgressChannel;
pub use files::{sanitize_title, transcript_filename, validate_filename};
