//! Simulated progress between authoritative updates.
//!
//! The estimator advances a display value toward a stage-dependent ceiling
//! on a fixed tick. Authoritative updates snap the display value up to the
//! confirmed one and recompute the ceiling, so the display never falls
//! behind the server and never runs past what the server will confirm.

use scribe_core::{DisplayUpdate, ProgressState, Stage};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Estimator tuning.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Tick cadence
    pub tick_interval: Duration,
    /// Room kept above a value that reached the ceiling
    pub headroom: f64,
    /// Distance from the ceiling at which easing starts
    pub ease_band: f64,
    /// Increment multiplier inside the easing band
    pub ease_factor: f64,
    /// Increment multiplier once a stage overruns its expected time
    pub catch_up_factor: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(500),
            headroom: 10.0,
            ease_band: 5.0,
            ease_factor: 0.3,
            catch_up_factor: 1.5,
        }
    }
}

impl EstimatorConfig {
    /// Set the tick cadence.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}

/// Progress estimator for one session.
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    state: ProgressState,
    clock: Instant,
    config: EstimatorConfig,
}

impl ProgressEstimator {
    /// Create an estimator anchored at the current instant.
    pub fn new(config: EstimatorConfig) -> Self {
        Self::with_start(config, Instant::now())
    }

    /// Create an estimator anchored at a given instant.
    pub fn with_start(config: EstimatorConfig, started: Instant) -> Self {
        Self {
            state: ProgressState::new(chrono::Utc::now()),
            clock: started,
            config,
        }
    }

    /// Current progress state.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Estimator configuration.
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Time since the session started.
    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.clock)
    }

    /// Increment the next tick would apply at `now`, before clamping.
    pub fn increment_at(&self, now: Instant) -> f64 {
        let rate = self.state.stage.rate();
        let mut increment = rate.base_speed;

        if self.elapsed_at(now) > rate.max_time {
            increment *= self.config.catch_up_factor;
        }

        if self.state.target - self.state.simulated < self.config.ease_band {
            increment *= self.config.ease_factor;
        }

        increment
    }

    /// Advance the simulated value by one tick.
    pub fn tick(&mut self) -> Option<DisplayUpdate> {
        self.tick_at(Instant::now())
    }

    /// Advance the simulated value by one tick at a given instant.
    ///
    /// Returns the display update when the value changed.
    pub fn tick_at(&mut self, now: Instant) -> Option<DisplayUpdate> {
        if self.state.simulated >= self.state.target {
            return None;
        }

        let increment = self.increment_at(now);
        let next = (self.state.simulated + increment).min(self.state.target);
        if next <= self.state.simulated {
            return None;
        }

        self.state.simulated = next;
        Some(self.display(self.state.stage.display_message()))
    }

    /// Record a confirmed value.
    ///
    /// The display value is raised to at least `value`. A value below the
    /// last confirmed one is ignored. Returns whether the value was accepted.
    pub fn snap(&mut self, value: f64) -> bool {
        let Some(value) = sanitize(value) else {
            warn!("Ignoring non-finite authoritative progress");
            return false;
        };

        if value < self.state.authoritative {
            debug!(
                "Ignoring regressed authoritative progress {} (confirmed {})",
                value, self.state.authoritative
            );
            return false;
        }

        self.state.authoritative = value;
        self.state.simulated = self.state.simulated.max(value);
        if self.state.simulated > self.state.target {
            self.state.target = self.state.simulated;
        }
        true
    }

    /// Reclassify the stage from a message and recompute the ceiling.
    pub fn reclassify(&mut self, value: f64, message: &str) {
        let value = sanitize(value).unwrap_or(self.state.authoritative);

        if let Some(stage) = Stage::classify(message) {
            if stage.rank() >= self.state.stage.rank() {
                if stage != self.state.stage {
                    debug!("Stage {} -> {}", self.state.stage, stage);
                }
                self.state.stage = stage;
            } else {
                debug!(
                    "Ignoring backwards stage {} while in {}",
                    stage, self.state.stage
                );
            }
        }

        let previous = self.state.target;
        let ceiling = self.state.stage.ceiling();
        let mut target = ceiling.max(previous);

        // Keep room above a value that reached the ceiling so the display
        // does not sit frozen on a just-confirmed number.
        if value >= previous || value >= ceiling {
            target = target.max((value + self.config.headroom).min(100.0));
        }

        self.state.target = target;
    }

    /// Jump to the completed state.
    pub fn complete(&mut self) {
        self.state.authoritative = 100.0;
        self.state.simulated = 100.0;
        self.state.target = 100.0;
        self.state.stage = Stage::Completed;
    }

    /// Display update for the current simulated value.
    pub fn display(&self, message: impl Into<String>) -> DisplayUpdate {
        DisplayUpdate::new(self.state.simulated, message)
    }
}

fn sanitize(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn estimator_at(start: Instant) -> ProgressEstimator {
        ProgressEstimator::with_start(EstimatorConfig::default(), start)
    }

    fn apply(estimator: &mut ProgressEstimator, value: f64, message: &str) {
        estimator.snap(value);
        estimator.reclassify(value, message);
    }

    #[test]
    fn test_parsing_update_sets_ceiling_and_rate() {
        let start = Instant::now();
        let mut estimator = estimator_at(start);

        apply(&mut estimator, 10.0, "parsing video info");
        assert_eq!(estimator.state().stage, Stage::Parsing);
        assert_eq!(estimator.state().target, 60.0);

        let now = start + Duration::from_secs(1);
        let update = estimator.tick_at(now).unwrap();
        assert!((update.progress - 10.3).abs() < EPS);
        assert_eq!(update.message, "Parsing video info...");

        estimator.tick_at(now).unwrap();
        assert!((estimator.state().simulated - 10.6).abs() < EPS);
    }

    #[test]
    fn test_catch_up_after_stage_overrun() {
        let start = Instant::now();
        let mut estimator = estimator_at(start);
        apply(&mut estimator, 20.0, "Parsing video info...");

        let late = start + Duration::from_secs(31);
        assert!((estimator.increment_at(late) - 0.45).abs() < EPS);

        let on_time = start + Duration::from_secs(30);
        assert!((estimator.increment_at(on_time) - 0.3).abs() < EPS);
    }

    #[test]
    fn test_easing_near_ceiling() {
        let start = Instant::now();
        let mut estimator = estimator_at(start);
        apply(&mut estimator, 30.0, "Downloading video...");
        assert_eq!(estimator.state().target, 60.0);

        apply(&mut estimator, 56.0, "Downloading video...");
        assert!((estimator.state().target - estimator.state().simulated - 4.0).abs() < EPS);
        assert!((estimator.increment_at(start) - 0.06).abs() < EPS);
    }

    #[test]
    fn test_headroom_above_previous_ceiling() {
        let mut estimator = estimator_at(Instant::now());
        apply(&mut estimator, 40.0, "Downloading video...");
        assert_eq!(estimator.state().target, 60.0);

        apply(&mut estimator, 75.0, "transcribing audio");
        assert_eq!(estimator.state().stage, Stage::Transcribing);
        assert_eq!(estimator.state().target, 85.0);
    }

    #[test]
    fn test_headroom_capped_at_hundred() {
        let mut estimator = estimator_at(Instant::now());
        apply(&mut estimator, 95.0, "Finalizing results...");
        assert_eq!(estimator.state().target, 100.0);
    }

    #[test]
    fn test_complete_forces_hundred() {
        let mut estimator = estimator_at(Instant::now());
        apply(&mut estimator, 40.0, "Transcribing audio...");
        estimator.complete();

        assert_eq!(estimator.state().simulated, 100.0);
        assert_eq!(estimator.state().authoritative, 100.0);
        assert_eq!(estimator.state().stage, Stage::Completed);
        assert!(estimator.tick().is_none());
    }

    #[test]
    fn test_snap_never_lowers_display() {
        let start = Instant::now();
        let mut estimator = estimator_at(start);
        apply(&mut estimator, 10.0, "Parsing video info...");
        for _ in 0..20 {
            estimator.tick_at(start);
        }
        let simulated = estimator.state().simulated;
        assert!(simulated > 10.0);

        assert!(estimator.snap(12.0));
        assert!(estimator.state().simulated >= 12.0);
        assert_eq!(estimator.state().simulated, simulated.max(12.0));
    }

    #[test]
    fn test_snap_ignores_regression() {
        let mut estimator = estimator_at(Instant::now());
        assert!(estimator.snap(40.0));
        assert!(!estimator.snap(35.0));
        assert_eq!(estimator.state().authoritative, 40.0);
        assert!(!estimator.snap(f64::NAN));
        assert_eq!(estimator.state().authoritative, 40.0);
    }

    #[test]
    fn test_snap_clamps_out_of_range() {
        let mut estimator = estimator_at(Instant::now());
        assert!(estimator.snap(140.0));
        assert_eq!(estimator.state().authoritative, 100.0);
        assert!(estimator.state().simulated <= estimator.state().target);
    }

    #[test]
    fn test_tick_stops_at_ceiling() {
        let start = Instant::now();
        let mut estimator = estimator_at(start);

        let mut last = 0.0;
        let mut emitted = 0;
        for _ in 0..1_000 {
            if let Some(update) = estimator.tick_at(start) {
                assert!(update.progress > last);
                last = update.progress;
                emitted += 1;
            }
        }

        assert!(emitted > 0);
        assert_eq!(estimator.state().simulated, 15.0);
        assert!(estimator.tick_at(start).is_none());
    }

    #[test]
    fn test_stage_never_moves_backwards() {
        let mut estimator = estimator_at(Instant::now());
        apply(&mut estimator, 40.0, "Transcribing audio...");
        apply(&mut estimator, 45.0, "Downloading video...");
        assert_eq!(estimator.state().stage, Stage::Transcribing);
    }

    #[test]
    fn test_message_without_keyword_keeps_stage() {
        let mut estimator = estimator_at(Instant::now());
        apply(&mut estimator, 40.0, "Transcribing audio...");
        apply(&mut estimator, 55.0, "Preparing transcript...");
        assert_eq!(estimator.state().stage, Stage::Transcribing);
        assert_eq!(estimator.state().target, 80.0);
    }

    #[test]
    fn test_invariants_over_backend_sequence() {
        let start = Instant::now();
        let mut estimator = estimator_at(start);
        let updates = [
            (0.0, "Starting processing..."),
            (10.0, "Downloading video..."),
            (15.0, "Parsing video info..."),
            (35.0, "Video downloaded, preparing transcription..."),
            (40.0, "Transcribing audio..."),
            (55.0, "Preparing transcript..."),
            (85.0, "Finalizing results..."),
        ];

        let mut last_authoritative = 0.0;
        let mut last_target = estimator.state().target;
        let mut last_display = 0.0;
        let mut last_rank = 0;

        for (step, (value, message)) in updates.iter().enumerate() {
            apply(&mut estimator, *value, message);

            let state = estimator.state();
            assert!(state.authoritative >= last_authoritative);
            assert!(state.simulated >= *value);
            assert!(state.target >= last_target);
            assert!(state.stage.rank() >= last_rank);
            assert!(state.simulated <= state.target);
            last_authoritative = state.authoritative;
            last_rank = state.stage.rank();

            if step == 3 {
                // No stage keyword: stays in the parsing/downloading band.
                assert_eq!(state.stage, Stage::Parsing);
                assert_eq!(state.target, 60.0);
            }

            for tick in 0..(40 * (step + 1)) {
                let now = start + Duration::from_millis(500 * tick as u64);
                estimator.tick_at(now);
                let state = estimator.state();
                assert!(state.simulated <= state.target);
                assert!(state.simulated >= last_display);
                last_display = state.simulated;
            }
            last_target = estimator.state().target;
        }
    }
}
