//! Runner configuration from TOML (`[runner]` section)

use fanout_application::RunnerParams;
use fanout_domain::{
    AggregationStrategy, ConfigIssue, ConfigIssueCode, ExecutionStrategy, ScoringConfig,
};
use serde::{Deserialize, Serialize};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Raw runner configuration from TOML
///
/// # Example
///
/// ```toml
/// [runner]
/// strategy = "parallel"        # "parallel" or "sequential"
/// aggregation = "consensus"    # "best", "voting", "consensus", "ensemble"
/// poll_interval_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRunnerConfig {
    pub strategy: String,
    pub aggregation: String,
    pub poll_interval_ms: u64,
}

impl Default for FileRunnerConfig {
    fn default() -> Self {
        Self {
            strategy: "parallel".to_string(),
            aggregation: "best".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl FileRunnerConfig {
    /// Parse strategy string into [`ExecutionStrategy`], returning warnings on failure.
    pub fn parse_strategy(&self) -> (ExecutionStrategy, Vec<ConfigIssue>) {
        match self.strategy.parse::<ExecutionStrategy>() {
            Ok(strategy) => (strategy, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "runner.strategy".to_string(),
                        value: self.strategy.clone(),
                        valid_values: vec!["parallel".to_string(), "sequential".to_string()],
                    },
                    format!(
                        "runner.strategy: unknown value '{}', falling back to 'parallel'",
                        self.strategy
                    ),
                );
                (ExecutionStrategy::default(), vec![issue])
            }
        }
    }

    /// Parse aggregation string into [`AggregationStrategy`]
    ///
    /// Accepts: "best", "voting", "vote", "consensus", "ensemble"
    pub fn parse_aggregation(&self) -> (AggregationStrategy, Vec<ConfigIssue>) {
        match self.aggregation.parse::<AggregationStrategy>() {
            Ok(aggregation) => (aggregation, vec![]),
            Err(_) => {
                let issue = ConfigIssue::warning(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "runner.aggregation".to_string(),
                        value: self.aggregation.clone(),
                        valid_values: vec![
                            "best".to_string(),
                            "voting".to_string(),
                            "consensus".to_string(),
                            "ensemble".to_string(),
                        ],
                    },
                    format!(
                        "runner.aggregation: unknown value '{}', falling back to 'best'",
                        self.aggregation
                    ),
                );
                (AggregationStrategy::default(), vec![issue])
            }
        }
    }

    /// Build [`RunnerParams`]; a zero poll interval falls back to the default.
    pub fn to_runner_params(&self, scoring: ScoringConfig) -> (RunnerParams, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let poll_interval_ms = if self.poll_interval_ms == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::OutOfRange {
                    field: "runner.poll_interval_ms".to_string(),
                    value: 0.0,
                },
                format!(
                    "runner.poll_interval_ms: 0 would busy-loop, falling back to {}",
                    DEFAULT_POLL_INTERVAL_MS
                ),
            ));
            DEFAULT_POLL_INTERVAL_MS
        } else {
            self.poll_interval_ms
        };

        let params = RunnerParams::default()
            .with_poll_interval_ms(poll_interval_ms)
            .with_scoring(scoring);
        (params, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runner_config_deserialize() {
        let toml_str = r#"
[runner]
strategy = "sequential"
aggregation = "vote"
poll_interval_ms = 250
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.runner.parse_strategy().0, ExecutionStrategy::Sequential);
        assert_eq!(config.runner.parse_aggregation().0, AggregationStrategy::Voting);

        let (params, issues) = config.runner.to_runner_params(ScoringConfig::default());
        assert!(issues.is_empty());
        assert_eq!(params.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_typo_strategy_warns() {
        let toml_str = r#"
[runner]
strategy = "paralel"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        assert!(issues.iter().any(|i| matches!(
            &i.code,
            ConfigIssueCode::InvalidEnumValue { field, .. } if field == "runner.strategy"
        )));
        assert!(issues.iter().all(|i| !i.is_error()));
        assert_eq!(config.runner.parse_strategy().0, ExecutionStrategy::Parallel);
    }

    #[test]
    fn test_typo_aggregation_warns() {
        let config = FileRunnerConfig {
            aggregation: "majority".to_string(),
            ..Default::default()
        };
        let (aggregation, issues) = config.parse_aggregation();
        assert_eq!(aggregation, AggregationStrategy::Best);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_zero_poll_interval_falls_back() {
        let config = FileRunnerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        let (params, issues) = config.to_runner_params(ScoringConfig::default());
        assert_eq!(params.poll_interval, Duration::from_millis(1000));
        assert_eq!(issues.len(), 1);
    }
}
