//! Budget configuration from TOML (`[limits]` section)

use fanout_domain::{ConfigIssue, ConfigIssueCode, LimitsConfig};
use serde::{Deserialize, Serialize};

/// Raw limits configuration from TOML
///
/// # Example
///
/// ```toml
/// [limits]
/// max_concurrent_iterations = 3
/// max_total_iterations = 10
/// total_timeout_seconds = 1800
/// per_iteration_timeout_seconds = 600
/// total_max_cost_usd = 1.50      # omit for no cost ceiling
/// total_max_tokens = 200000      # omit for no token ceiling
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLimitsConfig {
    pub max_concurrent_iterations: usize,
    pub max_total_iterations: usize,
    pub total_timeout_seconds: u64,
    pub per_iteration_timeout_seconds: u64,
    pub total_max_cost_usd: Option<f64>,
    pub total_max_tokens: Option<u64>,
}

impl Default for FileLimitsConfig {
    fn default() -> Self {
        let limits = LimitsConfig::default();
        Self {
            max_concurrent_iterations: limits.max_concurrent_iterations,
            max_total_iterations: limits.max_total_iterations,
            total_timeout_seconds: limits.total_timeout_seconds,
            per_iteration_timeout_seconds: limits.per_iteration_timeout_seconds,
            total_max_cost_usd: limits.total_max_cost_usd,
            total_max_tokens: limits.total_max_tokens,
        }
    }
}

impl FileLimitsConfig {
    /// Convert to [`LimitsConfig`], reporting values that can never work.
    ///
    /// A negative or non-finite cost ceiling is dropped with a warning.
    pub fn to_limits(&self) -> (LimitsConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        if self.max_concurrent_iterations == 0 {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroConcurrency,
                "limits.max_concurrent_iterations must be at least 1",
            ));
        }

        let total_max_cost_usd = match self.total_max_cost_usd {
            Some(cost) if !cost.is_finite() || cost < 0.0 => {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::OutOfRange {
                        field: "limits.total_max_cost_usd".to_string(),
                        value: cost,
                    },
                    format!(
                        "limits.total_max_cost_usd: {} is not a valid amount, ignoring the cost ceiling",
                        cost
                    ),
                ));
                None
            }
            other => other,
        };

        let limits = LimitsConfig {
            max_concurrent_iterations: self.max_concurrent_iterations,
            max_total_iterations: self.max_total_iterations,
            total_timeout_seconds: self.total_timeout_seconds,
            per_iteration_timeout_seconds: self.per_iteration_timeout_seconds,
            total_max_cost_usd,
            total_max_tokens: self.total_max_tokens,
        };
        (limits, issues)
    }
}
