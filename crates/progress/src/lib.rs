//! Progress Estimation
//!
//! Local simulation of job progress between sparse authoritative updates,
//! and point-in-time snapshots of a session's progress.

#![warn(missing_docs)]

pub mod tracker;
pub mod estimator;

pub use tracker::{ProgressTracker, ProgressSnapshot};
pub use estimator::{ProgressEstimator, EstimatorConfig};
