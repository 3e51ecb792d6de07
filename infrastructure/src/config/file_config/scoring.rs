//! Scoring configuration checks (`[scoring]` section)
//!
//! The section deserializes straight into [`ScoringConfig`]; this module only
//! validates it.
//!
//! ```toml
//! [scoring]
//! confidence_weight = 0.4
//! speed_weight = 0.05
//! timeout_penalty = 0.9
//! speed_reference_ms = 30000
//! ```

use fanout_domain::{ConfigIssue, ConfigIssueCode, ScoringConfig};

/// Tolerance when checking that the weights sum to 1
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

pub(super) fn validate_scoring(scoring: &ScoringConfig) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    let unit_fields = [
        ("scoring.confidence_weight", scoring.confidence_weight),
        ("scoring.completeness_weight", scoring.completeness_weight),
        ("scoring.code_quality_weight", scoring.code_quality_weight),
        ("scoring.responsiveness_weight", scoring.responsiveness_weight),
        ("scoring.speed_weight", scoring.speed_weight),
        ("scoring.cost_weight", scoring.cost_weight),
        ("scoring.neutral_value", scoring.neutral_value),
        ("scoring.timeout_penalty", scoring.timeout_penalty),
        ("scoring.error_penalty", scoring.error_penalty),
    ];
    for (field, value) in unit_fields {
        if !(0.0..=1.0).contains(&value) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: field.to_string(),
                    value,
                },
                format!("{}: {} must be within [0, 1]", field, value),
            ));
        }
    }

    if !scoring.cost_reference_usd.is_finite() || scoring.cost_reference_usd <= 0.0 {
        issues.push(ConfigIssue::error(
            ConfigIssueCode::OutOfRange {
                field: "scoring.cost_reference_usd".to_string(),
                value: scoring.cost_reference_usd,
            },
            "scoring.cost_reference_usd must be positive",
        ));
    }

    let sum = scoring.weight_sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
        issues.push(ConfigIssue::warning(
            ConfigIssueCode::WeightsNotNormalized { sum },
            format!(
                "scoring weights sum to {:.2}, scores will be normalized by that total",
                sum
            ),
        ));
    }

    issues
}
