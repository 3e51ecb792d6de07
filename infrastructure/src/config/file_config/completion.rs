//! Completion criteria from TOML (`[completion]` section)

use fanout_domain::{CompletionCriteria, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Raw completion criteria from TOML
///
/// Every rule is independent; the plan ends as soon as any configured rule
/// holds.
///
/// # Example
///
/// ```toml
/// [completion]
/// wait_for_all = false
/// min_acceptable_score = 0.85
/// stop_on_first_success = false
/// min_successful_variations = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCompletionConfig {
    pub wait_for_all: bool,
    pub min_acceptable_score: Option<f64>,
    pub stop_on_first_success: bool,
    pub min_successful_variations: Option<usize>,
}

impl Default for FileCompletionConfig {
    fn default() -> Self {
        Self {
            wait_for_all: true,
            min_acceptable_score: None,
            stop_on_first_success: false,
            min_successful_variations: None,
        }
    }
}

impl FileCompletionConfig {
    /// Convert to [`CompletionCriteria`].
    ///
    /// A score threshold outside [0, 1] is an error: it would either end
    /// every plan immediately or never.
    pub fn to_criteria(&self) -> (CompletionCriteria, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        if let Some(score) = self.min_acceptable_score
            && !(0.0..=1.0).contains(&score)
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: "completion.min_acceptable_score".to_string(),
                    value: score,
                },
                format!(
                    "completion.min_acceptable_score: {} must be within [0, 1]",
                    score
                ),
            ));
        }

        let criteria = CompletionCriteria {
            wait_for_all: self.wait_for_all,
            min_acceptable_score: self.min_acceptable_score,
            stop_on_first_success: self.stop_on_first_success,
            min_successful_variations: self.min_successful_variations,
        };
        (criteria, issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_waits_for_all() {
        let (criteria, issues) = FileCompletionConfig::default().to_criteria();
        assert!(issues.is_empty());
        assert_eq!(criteria, CompletionCriteria::wait_for_all());
    }

    #[test]
    fn test_completion_deserialize() {
        let toml_str = r#"
[completion]
wait_for_all = false
min_acceptable_score = 0.85
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let (criteria, issues) = config.completion.to_criteria();
        assert!(issues.is_empty());
        assert_eq!(criteria, CompletionCriteria::min_score(0.85));
    }

    #[test]
    fn test_score_out_of_range() {
        let config = FileCompletionConfig {
            min_acceptable_score: Some(85.0),
            ..Default::default()
        };
        let (_, issues) = config.to_criteria();
        assert!(issues[0].is_error());
        assert!(matches!(
            &issues[0].code,
            ConfigIssueCode::OutOfRange { field, .. } if field == "completion.min_acceptable_score"
        ));
    }
}
