//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod completion;
mod execution;
mod limits;
mod logging;
mod runner;
mod scoring;

pub use completion::FileCompletionConfig;
pub use execution::FileExecutionConfig;
pub use limits::FileLimitsConfig;
pub use logging::FileLoggingConfig;
pub use runner::FileRunnerConfig;

use fanout_application::RunnerParams;
use fanout_domain::{ConfigIssue, Plan, ScoringConfig};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Budgets shared by all variations of a plan
    pub limits: FileLimitsConfig,
    /// When a plan may stop early
    pub completion: FileCompletionConfig,
    /// Weights and penalties of the scorer
    pub scoring: ScoringConfig,
    /// Admission strategy, aggregation and poll interval
    pub runner: FileRunnerConfig,
    /// Process-backed execution service
    pub execution: FileExecutionConfig,
    /// Event log destination
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// This is the single entry point for config validation. It checks:
    /// 1. Limits that can never admit a variation
    /// 2. Completion thresholds outside [0, 1]
    /// 3. Scoring weights and penalties
    /// 4. Enum strings in `[runner]`
    /// 5. A blank execution program
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        issues.extend(self.limits.to_limits().1);
        issues.extend(self.completion.to_criteria().1);
        issues.extend(scoring::validate_scoring(&self.scoring));

        issues.extend(self.runner.parse_strategy().1);
        issues.extend(self.runner.parse_aggregation().1);
        issues.extend(self.runner.to_runner_params(self.scoring.clone()).1);

        issues.extend(self.execution.validate());

        issues
    }

    /// Apply limits, completion criteria, strategy and aggregation to a plan.
    ///
    /// Invalid values have already been reported by [`validate`](Self::validate);
    /// here they silently resolve to their fallbacks.
    pub fn configure_plan(&self, plan: Plan) -> Plan {
        plan.with_limits(self.limits.to_limits().0)
            .with_completion(self.completion.to_criteria().0)
            .with_strategy(self.runner.parse_strategy().0)
            .with_aggregation(self.runner.parse_aggregation().0)
    }

    pub fn runner_params(&self) -> RunnerParams {
        self.runner.to_runner_params(self.scoring.clone()).0
    }
}
