//! Stage model - coarse phases of a media job.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A coarse phase of the job, used to pick simulation rate and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Job accepted, nothing reported yet
    #[default]
    Preparing,
    /// Resolving the source and reading its metadata
    Parsing,
    /// Fetching the media and extracting audio
    Downloading,
    /// Speech-to-text running
    Transcribing,
    /// Final result available
    Completed,
}

/// Simulation rate for a stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageRate {
    /// Increment per tick, in percentage points
    pub base_speed: f64,
    /// Expected stage duration; past this the simulator catches up
    pub max_time: Duration,
}

impl StageRate {
    const fn new(base_speed: f64, max_secs: u64) -> Self {
        Self {
            base_speed,
            max_time: Duration::from_secs(max_secs),
        }
    }
}

impl Stage {
    /// Classify a stage from an authoritative message.
    ///
    /// Returns `None` when the message carries no stage keyword, in which
    /// case the caller keeps its current stage.
    pub fn classify(message: &str) -> Option<Stage> {
        let message = message.to_lowercase();
        if message.contains("parsing") {
            Some(Stage::Parsing)
        } else if message.contains("downloading") {
            Some(Stage::Downloading)
        } else if message.contains("transcrib") {
            Some(Stage::Transcribing)
        } else if message.contains("complet") {
            Some(Stage::Completed)
        } else {
            None
        }
    }

    /// Ceiling the simulated value may approach while in this stage.
    pub fn ceiling(&self) -> f64 {
        match self {
            Stage::Preparing => 15.0,
            Stage::Parsing | Stage::Downloading => 60.0,
            Stage::Transcribing => 80.0,
            Stage::Completed => 100.0,
        }
    }

    /// Simulation rate for this stage.
    pub fn rate(&self) -> StageRate {
        match self {
            Stage::Parsing => StageRate::new(0.3, 30),
            Stage::Downloading => StageRate::new(0.2, 120),
            Stage::Transcribing => StageRate::new(0.15, 180),
            Stage::Preparing | Stage::Completed => StageRate::new(0.2, 60),
        }
    }

    /// Position in the stage ordering. Parsing and downloading share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Stage::Preparing => 0,
            Stage::Parsing | Stage::Downloading => 1,
            Stage::Transcribing => 2,
            Stage::Completed => 3,
        }
    }

    /// Message shown while the simulator advances within this stage.
    pub fn display_message(&self) -> &'static str {
        match self {
            Stage::Preparing => "Preparing...",
            Stage::Parsing => "Parsing video info...",
            Stage::Downloading => "Downloading video...",
            Stage::Transcribing => "Transcribing audio...",
            Stage::Completed => "Processing completed!",
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preparing => "preparing",
            Stage::Parsing => "parsing",
            Stage::Downloading => "downloading",
            Stage::Transcribing => "transcribing",
            Stage::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_keywords() {
        assert_eq!(Stage::classify("Parsing video info..."), Some(Stage::Parsing));
        assert_eq!(Stage::classify("Downloading video..."), Some(Stage::Downloading));
        assert_eq!(Stage::classify("Transcribing audio..."), Some(Stage::Transcribing));
        assert_eq!(Stage::classify("Processing completed!"), Some(Stage::Completed));
    }

    #[test]
    fn test_classify_without_keyword() {
        assert_eq!(Stage::classify("Preparing transcript..."), None);
        assert_eq!(Stage::classify("Finalizing results..."), None);
        // "transcription" does not contain "transcrib"
        assert_eq!(
            Stage::classify("Video downloaded, preparing transcription..."),
            None
        );
        assert_eq!(Stage::classify(""), None);
    }

    #[test]
    fn test_ceilings() {
        assert_eq!(Stage::Preparing.ceiling(), 15.0);
        assert_eq!(Stage::Parsing.ceiling(), 60.0);
        assert_eq!(Stage::Downloading.ceiling(), 60.0);
        assert_eq!(Stage::Transcribing.ceiling(), 80.0);
        assert_eq!(Stage::Completed.ceiling(), 100.0);
    }

    #[test]
    fn test_rate_table() {
        assert_eq!(Stage::Parsing.rate().base_speed, 0.3);
        assert_eq!(Stage::Parsing.rate().max_time, Duration::from_secs(30));
        assert_eq!(Stage::Downloading.rate().max_time, Duration::from_secs(120));
        assert_eq!(Stage::Transcribing.rate().base_speed, 0.15);
        assert_eq!(Stage::Preparing.rate(), StageRate::new(0.2, 60));
    }

    #[test]
    fn test_rank_ordering() {
        assert!(Stage::Preparing.rank() < Stage::Parsing.rank());
        assert_eq!(Stage::Parsing.rank(), Stage::Downloading.rank());
        assert!(Stage::Downloading.rank() < Stage::Transcribing.rank());
        assert!(Stage::Transcribing.rank() < Stage::Completed.rank());
    }
}
