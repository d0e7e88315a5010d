//! Session configuration.

use scribe_progress::EstimatorConfig;

/// Configuration for task sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Estimator tuning, including the tick cadence
    pub estimator: EstimatorConfig,
    /// Whether a dropped push channel triggers the one-shot status fetch
    pub fallback_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            estimator: EstimatorConfig::default(),
            fallback_enabled: true,
        }
    }
}

impl SessionConfig {
    /// Set the estimator configuration.
    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    /// Enable or disable the fallback status fetch.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }
}
