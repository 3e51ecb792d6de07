//! Budget ceilings and the admission-control state machine.
//!
//! [`LimitEnforcer`] answers one question, "may another variation start right
//! now?", and keeps the running totals needed to answer it. Checks never
//! mutate state; only the explicit `record_*` methods do.

use super::result::IterationResult;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Budget ceilings for a plan.
///
/// All ceilings are soft: they are checked when a variation asks to start,
/// never enforced against runs that are already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_concurrent_iterations: usize,
    pub max_total_iterations: usize,
    pub total_timeout_seconds: u64,
    pub per_iteration_timeout_seconds: u64,
    /// `None` means no cost ceiling
    pub total_max_cost_usd: Option<f64>,
    /// `None` means no token ceiling
    pub total_max_tokens: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_iterations: 3,
            max_total_iterations: 10,
            total_timeout_seconds: 1800,
            per_iteration_timeout_seconds: 600,
            total_max_cost_usd: None,
            total_max_tokens: None,
        }
    }
}

impl LimitsConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_iterations = max;
        self
    }

    pub fn with_max_total(mut self, max: usize) -> Self {
        self.max_total_iterations = max;
        self
    }

    pub fn with_total_timeout_seconds(mut self, seconds: u64) -> Self {
        self.total_timeout_seconds = seconds;
        self
    }

    pub fn with_per_iteration_timeout_seconds(mut self, seconds: u64) -> Self {
        self.per_iteration_timeout_seconds = seconds;
        self
    }

    pub fn with_max_cost_usd(mut self, cost: f64) -> Self {
        self.total_max_cost_usd = Some(cost);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.total_max_tokens = Some(tokens);
        self
    }
}

/// Why a variation may not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    MaxConcurrent,
    MaxTotal,
    TotalTimeout,
    CostLimit,
    TokenLimit,
}

impl DenialReason {
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::MaxConcurrent => "Max concurrent iterations reached",
            DenialReason::MaxTotal => "Max total iterations reached",
            DenialReason::TotalTimeout => "Total timeout exceeded",
            DenialReason::CostLimit => "Total cost limit exceeded",
            DenialReason::TokenLimit => "Total token limit exceeded",
        }
    }

    /// Budget is spent for the rest of the run. Only the concurrency
    /// ceiling can clear again as in-flight runs finish.
    pub fn is_exhausted(&self) -> bool {
        !matches!(self, DenialReason::MaxConcurrent)
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Outcome of an admission check. Denial is a scheduling decision, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
}

impl SpawnDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Admission control for one plan execution.
///
/// # Example
///
/// ```
/// use fanout_domain::{LimitEnforcer, LimitsConfig};
///
/// let mut limits = LimitEnforcer::new(LimitsConfig::default().with_max_concurrent(1));
/// assert!(limits.can_spawn().allowed);
///
/// limits.record_spawn();
/// let decision = limits.can_spawn();
/// assert!(!decision.allowed);
/// assert_eq!(decision.reason.unwrap().to_string(), "Max concurrent iterations reached");
/// ```
#[derive(Debug, Clone)]
pub struct LimitEnforcer {
    config: LimitsConfig,
    active_count: usize,
    completed_count: usize,
    total_cost: f64,
    total_tokens: u64,
    start_time: Instant,
}

impl LimitEnforcer {
    pub fn new(config: LimitsConfig) -> Self {
        Self::with_start(config, Instant::now())
    }

    /// Create an enforcer whose clock started at `start_time`.
    pub fn with_start(config: LimitsConfig, start_time: Instant) -> Self {
        Self {
            config,
            active_count: 0,
            completed_count: 0,
            total_cost: 0.0,
            total_tokens: 0,
            start_time,
        }
    }

    pub fn config(&self) -> &LimitsConfig {
        &self.config
    }

    /// Check the ceilings in order and report the first one hit.
    pub fn can_spawn(&self) -> SpawnDecision {
        if self.active_count >= self.config.max_concurrent_iterations {
            return SpawnDecision::deny(DenialReason::MaxConcurrent);
        }
        if self.active_count + self.completed_count >= self.config.max_total_iterations {
            return SpawnDecision::deny(DenialReason::MaxTotal);
        }
        if self.elapsed() >= Duration::from_secs(self.config.total_timeout_seconds) {
            return SpawnDecision::deny(DenialReason::TotalTimeout);
        }
        if let Some(max_cost) = self.config.total_max_cost_usd
            && self.total_cost >= max_cost
        {
            return SpawnDecision::deny(DenialReason::CostLimit);
        }
        if let Some(max_tokens) = self.config.total_max_tokens
            && self.total_tokens >= max_tokens
        {
            return SpawnDecision::deny(DenialReason::TokenLimit);
        }
        SpawnDecision::allow()
    }

    pub fn record_spawn(&mut self) {
        self.active_count += 1;
    }

    /// Give back a slot taken by [`record_spawn`](Self::record_spawn) for a
    /// start that was abandoned. Nothing counts as completed.
    pub fn release_spawn(&mut self) {
        self.active_count = self.active_count.saturating_sub(1);
    }

    /// Account for a finished variation. Missing usage counts as zero.
    pub fn record_completion(&mut self, result: &IterationResult) {
        self.active_count = self.active_count.saturating_sub(1);
        self.completed_count += 1;
        if let Some(usage) = &result.usage {
            self.total_cost += usage.estimated_cost_usd.unwrap_or(0.0);
            self.total_tokens += usage.total_tokens.unwrap_or(0);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Milliseconds left in the plan's global budget, floored at zero.
    pub fn remaining_time_ms(&self) -> u64 {
        let total_ms = self.config.total_timeout_seconds.saturating_mul(1000);
        let elapsed_ms = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        total_ms.saturating_sub(elapsed_ms)
    }

    /// Time a variation starting now may run: the per-iteration ceiling,
    /// capped by what the plan has left.
    pub fn iteration_timeout_ms(&self) -> u64 {
        self.config
            .per_iteration_timeout_seconds
            .saturating_mul(1000)
            .min(self.remaining_time_ms())
    }

    /// Zero every counter and restart the clock.
    pub fn reset(&mut self) {
        self.active_count = 0;
        self.completed_count = 0;
        self.total_cost = 0.0;
        self.total_tokens = 0;
        self.start_time = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::result::{IterationResult, UsageStats};

    fn finished(cost: f64, tokens: u64) -> IterationResult {
        IterationResult::success("v", "done").with_usage(UsageStats {
            total_tokens: Some(tokens),
            estimated_cost_usd: Some(cost),
            ..Default::default()
        })
    }

    fn started_secs_ago(config: LimitsConfig, secs: u64) -> LimitEnforcer {
        let start = Instant::now()
            .checked_sub(Duration::from_secs(secs))
            .unwrap();
        LimitEnforcer::with_start(config, start)
    }

    #[test]
    fn test_fresh_enforcer_allows() {
        let limits = LimitEnforcer::new(LimitsConfig::default());
        assert_eq!(limits.can_spawn(), SpawnDecision::allow());
    }

    #[test]
    fn test_concurrency_ceiling() {
        let mut limits = LimitEnforcer::new(LimitsConfig::default().with_max_concurrent(2));
        limits.record_spawn();
        assert!(limits.can_spawn().allowed);
        limits.record_spawn();
        assert_eq!(
            limits.can_spawn().reason,
            Some(DenialReason::MaxConcurrent)
        );

        limits.record_completion(&finished(0.0, 0));
        assert!(limits.can_spawn().allowed);
    }

    #[test]
    fn test_total_iterations_ceiling() {
        let mut limits = LimitEnforcer::new(
            LimitsConfig::default()
                .with_max_concurrent(5)
                .with_max_total(2),
        );
        limits.record_spawn();
        limits.record_completion(&finished(0.0, 0));
        limits.record_spawn();
        assert_eq!(limits.can_spawn().reason, Some(DenialReason::MaxTotal));
    }

    #[test]
    fn test_zero_timeout_denies_immediately() {
        let limits = LimitEnforcer::new(LimitsConfig::default().with_total_timeout_seconds(0));
        let decision = limits.can_spawn();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::TotalTimeout));
        assert_eq!(limits.remaining_time_ms(), 0);
        assert_eq!(limits.iteration_timeout_ms(), 0);
    }

    #[test]
    fn test_cost_and_token_ceilings() {
        let mut limits = LimitEnforcer::new(
            LimitsConfig::default()
                .with_max_cost_usd(1.0)
                .with_max_tokens(1_000_000),
        );
        limits.record_spawn();
        limits.record_completion(&finished(1.5, 10));
        assert_eq!(limits.can_spawn().reason, Some(DenialReason::CostLimit));

        let mut limits = LimitEnforcer::new(LimitsConfig::default().with_max_tokens(100));
        limits.record_spawn();
        limits.record_completion(&finished(0.0, 100));
        assert_eq!(limits.can_spawn().reason, Some(DenialReason::TokenLimit));
    }

    #[test]
    fn test_check_order_reports_first_violation() {
        // Concurrency and cost both violated: concurrency wins
        let mut limits = LimitEnforcer::new(
            LimitsConfig::default()
                .with_max_concurrent(1)
                .with_max_cost_usd(0.0),
        );
        limits.record_spawn();
        assert_eq!(
            limits.can_spawn().reason,
            Some(DenialReason::MaxConcurrent)
        );
    }

    #[test]
    fn test_active_count_never_negative() {
        let mut limits = LimitEnforcer::new(LimitsConfig::default());
        limits.record_completion(&finished(0.0, 0));
        limits.record_completion(&IterationResult::failure("v", "boom"));
        assert_eq!(limits.active_count(), 0);
        assert_eq!(limits.completed_count(), 2);
    }

    #[test]
    fn test_release_spawn_frees_slot_without_completing() {
        let mut limits = LimitEnforcer::new(LimitsConfig::default().with_max_concurrent(1));
        limits.record_spawn();
        assert!(!limits.can_spawn().allowed);

        limits.release_spawn();
        limits.release_spawn();
        assert!(limits.can_spawn().allowed);
        assert_eq!(limits.active_count(), 0);
        assert_eq!(limits.completed_count(), 0);
    }

    #[test]
    fn test_missing_usage_counts_as_zero() {
        let mut limits = LimitEnforcer::new(LimitsConfig::default());
        limits.record_spawn();
        limits.record_completion(&IterationResult::success("v", "out"));
        assert_eq!(limits.total_cost(), 0.0);
        assert_eq!(limits.total_tokens(), 0);
    }

    #[test]
    fn test_remaining_time_floors_at_zero() {
        let limits = started_secs_ago(
            LimitsConfig::default().with_total_timeout_seconds(10),
            30,
        );
        assert_eq!(limits.remaining_time_ms(), 0);
        assert_eq!(limits.can_spawn().reason, Some(DenialReason::TotalTimeout));
    }

    #[test]
    fn test_iteration_timeout_capped_by_remaining_time() {
        let config = LimitsConfig::default()
            .with_total_timeout_seconds(100)
            .with_per_iteration_timeout_seconds(60);

        let fresh = LimitEnforcer::new(config.clone());
        assert_eq!(fresh.iteration_timeout_ms(), 60_000);

        let late = started_secs_ago(config, 70);
        let timeout = late.iteration_timeout_ms();
        assert!(timeout <= 30_000);
        assert!(timeout <= late.remaining_time_ms() || late.remaining_time_ms() == 0);
    }

    #[test]
    fn test_remaining_time_non_increasing() {
        let limits = LimitEnforcer::new(LimitsConfig::default());
        let first = limits.remaining_time_ms();
        std::thread::sleep(Duration::from_millis(5));
        assert!(limits.remaining_time_ms() <= first);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut limits = started_secs_ago(LimitsConfig::default(), 5);
        limits.record_spawn();
        limits.record_completion(&finished(0.5, 50));
        limits.reset();

        assert_eq!(limits.active_count(), 0);
        assert_eq!(limits.completed_count(), 0);
        assert_eq!(limits.total_cost(), 0.0);
        assert_eq!(limits.total_tokens(), 0);
        assert!(limits.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_exhausted_reasons() {
        assert!(!DenialReason::MaxConcurrent.is_exhausted());
        assert!(DenialReason::MaxTotal.is_exhausted());
        assert!(DenialReason::TotalTimeout.is_exhausted());
        assert!(DenialReason::CostLimit.is_exhausted());
        assert!(DenialReason::TokenLimit.is_exhausted());
    }
}
