//! Structured configuration issues.
//!
//! Parsing raw configuration never fails outright: each problem is reported
//! as a [`ConfigIssue`]. Warnings mean a default was used instead; errors mean
//! the run cannot proceed.
//!
//! # Examples
//!
//! ```
//! use fanout_domain::config::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
//!
//! let issues = vec![ConfigIssue::warning(
//!     ConfigIssueCode::WeightsNotNormalized { sum: 0.9 },
//!     "scoring weights sum to 0.90",
//! )];
//! assert!(!has_errors(&issues));
//! ```

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a default was substituted.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigIssueCode {
    /// A string field did not parse into its enum.
    InvalidEnumValue {
        field: String,
        value: String,
        valid_values: Vec<String>,
    },
    /// A score, weight or penalty outside [0,1].
    OutOfRange { field: String, value: f64 },
    /// Scoring weights do not add up to 1.
    WeightsNotNormalized { sum: f64 },
    /// `max_concurrent_iterations = 0` can never admit anything.
    ZeroConcurrency,
    /// The process execution adapter has nothing to run.
    EmptyExecutionProgram,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.message)
    }
}

/// Whether any issue is fatal.
pub fn has_errors(issues: &[ConfigIssue]) -> bool {
    issues.iter().any(ConfigIssue::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_errors() {
        let warning = ConfigIssue::warning(ConfigIssueCode::ZeroConcurrency, "w");
        let error = ConfigIssue::error(ConfigIssueCode::EmptyExecutionProgram, "e");
        assert!(!has_errors(&[warning.clone()]));
        assert!(has_errors(&[warning, error]));
        assert!(!has_errors(&[]));
    }

    #[test]
    fn test_display() {
        let issue = ConfigIssue::error(
            ConfigIssueCode::OutOfRange {
                field: "completion.min_acceptable_score".to_string(),
                value: 1.5,
            },
            "completion.min_acceptable_score must be within [0, 1]",
        );
        assert_eq!(
            issue.to_string(),
            "error: completion.min_acceptable_score must be within [0, 1]"
        );
    }
}
