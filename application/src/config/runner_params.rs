//! Runner parameters: control loop settings.
//!
//! [`RunnerParams`] groups the static settings of
//! [`RunIterationsUseCase`](crate::use_cases::run_iterations::RunIterationsUseCase)
//! that are not part of the plan itself. Budgets and completion rules live
//! on the [`Plan`](fanout_domain::Plan); these only shape how the loop runs.

use fanout_domain::ScoringConfig;
use std::time::Duration;

/// Control loop parameters.
#[derive(Debug, Clone)]
pub struct RunnerParams {
    /// Wait between two polls of the in-flight runs.
    pub poll_interval: Duration,
    /// Used when the execution service reports neither a score nor a
    /// confidence, and for failed results.
    pub scoring: ScoringConfig,
}

impl Default for RunnerParams {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            scoring: ScoringConfig::default(),
        }
    }
}

impl RunnerParams {
    // ==================== Builder Methods ====================

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_interval_ms(self, millis: u64) -> Self {
        self.with_poll_interval(Duration::from_millis(millis))
    }

    pub fn with_scoring(mut self, scoring: ScoringConfig) -> Self {
        self.scoring = scoring;
        self
    }
}
