//! Execution adapter configuration from TOML (`[execution]` section)

use crate::execution::ProcessConfig;
use fanout_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw execution configuration from TOML
///
/// The program is launched once per variation and receives the variation
/// as JSON on stdin.
///
/// # Example
///
/// ```toml
/// [execution]
/// program = "my-agent"
/// args = ["--json"]
/// working_dir = "/path/to/repo"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    /// Unset means no process adapter is configured
    pub program: Option<String>,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl FileExecutionConfig {
    /// A set-but-blank program is an error; an unset one is not.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        match &self.program {
            Some(program) if program.trim().is_empty() => vec![ConfigIssue::error(
                ConfigIssueCode::EmptyExecutionProgram,
                "execution.program is set but empty",
            )],
            _ => vec![],
        }
    }

    /// Build the process adapter settings, if a program is configured.
    pub fn to_process_config(&self) -> Option<ProcessConfig> {
        let program = self.program.as_deref().map(str::trim)?;
        if program.is_empty() {
            return None;
        }
        let mut config = ProcessConfig::new(program).with_args(self.args.clone());
        if let Some(dir) = &self.working_dir {
            config = config.with_working_dir(dir.clone());
        }
        Some(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_deserialize() {
        let toml_str = r#"
[execution]
program = "agent"
args = ["--json", "--quiet"]
working_dir = "/tmp"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let process = config.execution.to_process_config().unwrap();
        assert_eq!(process.program, "agent");
        assert_eq!(process.args, vec!["--json", "--quiet"]);
        assert_eq!(process.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_unset_program() {
        let config = FileExecutionConfig::default();
        assert!(config.validate().is_empty());
        assert!(config.to_process_config().is_none());
    }

    #[test]
    fn test_blank_program_is_error() {
        let config = FileExecutionConfig {
            program: Some("  ".to_string()),
            ..Default::default()
        };
        let issues = config.validate();
        assert_eq!(issues[0].code, ConfigIssueCode::EmptyExecutionProgram);
        assert!(issues[0].is_error());
        assert!(config.to_process_config().is_none());
    }
}
