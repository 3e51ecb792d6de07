//! Scalar quality score for a single iteration result.
//!
//! Successful results are scored as a weighted sum of their quality metrics
//! plus speed and cost terms. Failed results get a fixed score derived from a
//! penalty (timeouts are penalized slightly less than errors).

use crate::iteration::result::IterationResult;
use serde::{Deserialize, Serialize};

/// Weights and reference points used by [`score_result`].
///
/// The six weights are expected to sum to 1. When they don't, the weighted
/// sum is normalized by their total so the score stays in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub confidence_weight: f64,
    pub completeness_weight: f64,
    pub code_quality_weight: f64,
    pub responsiveness_weight: f64,
    pub speed_weight: f64,
    pub cost_weight: f64,
    /// Value used for a metric the result does not report
    pub neutral_value: f64,
    pub timeout_penalty: f64,
    pub error_penalty: f64,
    /// Duration at which the speed term is 0.5
    pub speed_reference_ms: u64,
    /// Cost at which the cost term is 0.5
    pub cost_reference_usd: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            confidence_weight: 0.30,
            completeness_weight: 0.20,
            code_quality_weight: 0.15,
            responsiveness_weight: 0.10,
            speed_weight: 0.15,
            cost_weight: 0.10,
            neutral_value: 0.5,
            timeout_penalty: 0.9,
            error_penalty: 1.0,
            speed_reference_ms: 60_000,
            cost_reference_usd: 0.10,
        }
    }
}

impl ScoringConfig {
    pub fn weight_sum(&self) -> f64 {
        self.weights().iter().sum()
    }

    fn weights(&self) -> [f64; 6] {
        [
            self.confidence_weight,
            self.completeness_weight,
            self.code_quality_weight,
            self.responsiveness_weight,
            self.speed_weight,
            self.cost_weight,
        ]
    }

    fn neutral(&self) -> f64 {
        unit(self.neutral_value, 0.5)
    }
}

/// Score one result in [0,1].
///
/// # Example
///
/// ```
/// use fanout_domain::selection::scoring::{ScoringConfig, score_result};
/// use fanout_domain::IterationResult;
///
/// let config = ScoringConfig::default();
/// let failed = IterationResult::failure("model-0", "boom");
/// assert_eq!(score_result(&failed, &config), 0.0);
///
/// let timed_out = IterationResult::timeout("model-1", "time limit");
/// assert!((score_result(&timed_out, &config) - 0.1).abs() < 1e-9);
/// ```
pub fn score_result(result: &IterationResult, config: &ScoringConfig) -> f64 {
    if !result.success {
        let penalty = if result.timed_out {
            config.timeout_penalty
        } else {
            config.error_penalty
        };
        return unit(1.0 - penalty, 0.0);
    }

    let neutral = config.neutral();
    let metric = |value: Option<f64>| value.map_or(neutral, |v| unit(v, neutral));

    let terms = [
        metric(result.metrics.confidence),
        metric(result.metrics.completeness),
        metric(result.metrics.code_quality),
        metric(result.metrics.responsiveness),
        speed_term(result.duration_ms, config.speed_reference_ms),
        cost_term(result, config.cost_reference_usd, neutral),
    ];

    let weights = config.weights().map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return neutral;
    }

    let sum: f64 = terms.iter().zip(weights.iter()).map(|(t, w)| t * w).sum();
    unit(sum / total, neutral)
}

/// `ref / (ref + duration)`: 1.0 for an instant result, approaching 0 as the
/// duration grows.
fn speed_term(duration_ms: u64, reference_ms: u64) -> f64 {
    let reference = reference_ms.max(1) as f64;
    reference / (reference + duration_ms as f64)
}

fn cost_term(result: &IterationResult, reference_usd: f64, neutral: f64) -> f64 {
    let Some(cost) = result.usage.as_ref().and_then(|u| u.estimated_cost_usd) else {
        return neutral;
    };
    if !cost.is_finite() || reference_usd <= 0.0 {
        return neutral;
    }
    reference_usd / (reference_usd + cost.max(0.0))
}

/// Clamp to [0,1], replacing NaN with `fallback`.
fn unit(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iteration::result::{ResultMetrics, UsageStats};

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        approx(ScoringConfig::default().weight_sum(), 1.0);
    }

    // ==================== Failures ====================

    #[test]
    fn test_failure_penalties() {
        let config = ScoringConfig::default();
        approx(score_result(&IterationResult::failure("a", "err"), &config), 0.0);
        approx(score_result(&IterationResult::timeout("a", "slow"), &config), 0.1);
    }

    #[test]
    fn test_penalty_out_of_range_still_clamped() {
        let config = ScoringConfig {
            error_penalty: -2.0,
            ..Default::default()
        };
        approx(score_result(&IterationResult::failure("a", "err"), &config), 1.0);
    }

    // ==================== Successes ====================

    #[test]
    fn test_all_missing_metrics_is_neutral_except_speed() {
        let config = ScoringConfig::default();
        // duration 0 => speed term 1.0, everything else neutral
        let result = IterationResult::success("a", "ok");
        approx(score_result(&result, &config), 0.85 * 0.5 + 0.15);
    }

    #[test]
    fn test_perfect_result() {
        let config = ScoringConfig::default();
        let result = IterationResult::success("a", "ok")
            .with_metrics(ResultMetrics {
                confidence: Some(1.0),
                completeness: Some(1.0),
                code_quality: Some(1.0),
                responsiveness: Some(1.0),
                overall_score: 0.0,
            })
            .with_usage(UsageStats {
                estimated_cost_usd: Some(0.0),
                ..Default::default()
            });
        approx(score_result(&result, &config), 1.0);
    }

    #[test]
    fn test_speed_saturates() {
        let config = ScoringConfig::default();
        let fast = IterationResult::success("a", "ok").with_duration_ms(1_000);
        let reference = IterationResult::success("b", "ok").with_duration_ms(60_000);
        let slow = IterationResult::success("c", "ok").with_duration_ms(3_600_000);

        let (f, r, s) = (
            score_result(&fast, &config),
            score_result(&reference, &config),
            score_result(&slow, &config),
        );
        assert!(f > r && r > s);
        approx(r, 0.85 * 0.5 + 0.15 * 0.5);
        assert!(s > 0.0);
    }

    #[test]
    fn test_cost_decreases_score() {
        let config = ScoringConfig::default();
        let cheap = IterationResult::success("a", "ok").with_usage(UsageStats {
            estimated_cost_usd: Some(0.01),
            ..Default::default()
        });
        let pricey = IterationResult::success("b", "ok").with_usage(UsageStats {
            estimated_cost_usd: Some(5.0),
            ..Default::default()
        });
        assert!(score_result(&cheap, &config) > score_result(&pricey, &config));
    }

    #[test]
    fn test_unnormalized_weights_stay_in_range() {
        let config = ScoringConfig {
            confidence_weight: 3.0,
            completeness_weight: 2.0,
            ..Default::default()
        };
        let result = IterationResult::success("a", "ok").with_confidence(1.0);
        let score = score_result(&result, &config);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_zero_weights_fall_back_to_neutral() {
        let config = ScoringConfig {
            confidence_weight: 0.0,
            completeness_weight: 0.0,
            code_quality_weight: 0.0,
            responsiveness_weight: 0.0,
            speed_weight: 0.0,
            cost_weight: 0.0,
            ..Default::default()
        };
        approx(score_result(&IterationResult::success("a", "ok"), &config), 0.5);
    }

    #[test]
    fn test_nan_metric_treated_as_neutral() {
        let config = ScoringConfig::default();
        let mut result = IterationResult::success("a", "ok");
        result.metrics.confidence = Some(f64::NAN);
        let score = score_result(&result, &config);
        approx(score, 0.85 * 0.5 + 0.15);
    }
}
