//! Variation entity - one parameterized attempt at a task.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Reasoning depth requested from the model running a variation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Off,
    Minimal,
    Low,
    Medium,
    High,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Off => "off",
            ThinkingLevel::Minimal => "minimal",
            ThinkingLevel::Low => "low",
            ThinkingLevel::Medium => "medium",
            ThinkingLevel::High => "high",
        }
    }
}

impl std::fmt::Display for ThinkingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ThinkingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" => Ok(ThinkingLevel::Off),
            "minimal" => Ok(ThinkingLevel::Minimal),
            "low" => Ok(ThinkingLevel::Low),
            "medium" => Ok(ThinkingLevel::Medium),
            "high" => Ok(ThinkingLevel::High),
            _ => Err(format!(
                "Unknown thinking level: {}. Valid: off, minimal, low, medium, high",
                s
            )),
        }
    }
}

/// Lifecycle of a single variation.
///
/// ```text
/// pending ──► spawned ──► completed | failed | timeout
///    │
///    └──────► failed | skipped
/// ```
///
/// Transitions only move forward; nothing returns to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VariationStatus {
    #[default]
    Pending,
    Spawned,
    Completed,
    Failed,
    Timeout,
    Skipped,
}

impl VariationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariationStatus::Pending => "pending",
            VariationStatus::Spawned => "spawned",
            VariationStatus::Completed => "completed",
            VariationStatus::Failed => "failed",
            VariationStatus::Timeout => "timeout",
            VariationStatus::Skipped => "skipped",
        }
    }

    /// Whether the variation has finished for good.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VariationStatus::Completed
                | VariationStatus::Failed
                | VariationStatus::Timeout
                | VariationStatus::Skipped
        )
    }

    /// Whether `next` is a legal successor of this status.
    pub fn can_transition_to(&self, next: VariationStatus) -> bool {
        use VariationStatus::{Completed, Failed, Pending, Skipped, Spawned, Timeout};

        matches!(
            (self, next),
            (Pending, Spawned | Failed | Skipped) | (Spawned, Completed | Failed | Timeout)
        )
    }
}

impl std::fmt::Display for VariationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One variant of the plan's task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    /// Unique within the owning plan
    pub id: String,
    /// Human-readable label (e.g. "claude-sonnet-4.5 + high")
    pub label: String,
    /// Lower runs first
    pub priority: u32,
    pub status: VariationStatus,
    /// Task prompt this variation executes
    #[serde(default)]
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ThinkingLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    /// Assigned by the execution service once spawned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
}

impl Variation {
    pub fn new(id: impl Into<String>, label: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            priority,
            status: VariationStatus::Pending,
            task: String::new(),
            model: None,
            thinking_level: None,
            additional_context: None,
            constraints: Vec::new(),
            run_id: None,
            session_key: None,
        }
    }

    // ==================== Builder Methods ====================

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_thinking_level(mut self, level: ThinkingLevel) -> Self {
        self.thinking_level = Some(level);
        self
    }

    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    pub fn with_constraints(mut self, constraints: Vec<String>) -> Self {
        self.constraints = constraints;
        self
    }

    // ==================== Lifecycle ====================

    /// Move to `next`, refusing anything that is not a forward step.
    pub fn transition(&mut self, next: VariationStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                id: self.id.clone(),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record the run handle assigned by the execution service.
    pub fn mark_spawned(
        &mut self,
        run_id: impl Into<String>,
        session_key: impl Into<String>,
    ) -> Result<(), DomainError> {
        self.transition(VariationStatus::Spawned)?;
        self.run_id = Some(run_id.into());
        self.session_key = Some(session_key.into());
        Ok(())
    }

    /// Prompt text sent to the execution service: the task followed by the
    /// variant's extra context and constraints, if any.
    pub fn effective_prompt(&self) -> String {
        let mut prompt = self.task.clone();
        if let Some(context) = &self.additional_context {
            if !prompt.is_empty() {
                prompt.push_str("\n\n");
            }
            prompt.push_str(context);
        }
        if !self.constraints.is_empty() {
            if !prompt.is_empty() {
                prompt.push_str("\n\n");
            }
            prompt.push_str("Constraints:\n");
            for constraint in &self.constraints {
                prompt.push_str("- ");
                prompt.push_str(constraint);
                prompt.push('\n');
            }
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_variation_is_pending() {
        let variation = Variation::new("model-0", "sonnet", 0);
        assert_eq!(variation.status, VariationStatus::Pending);
        assert!(variation.run_id.is_none());
    }

    #[test]
    fn test_forward_transitions() {
        let mut variation = Variation::new("a", "a", 0);
        variation.mark_spawned("run-1", "session-1").unwrap();
        assert_eq!(variation.status, VariationStatus::Spawned);
        assert_eq!(variation.run_id.as_deref(), Some("run-1"));

        variation.transition(VariationStatus::Timeout).unwrap();
        assert!(variation.status.is_terminal());
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut variation = Variation::new("a", "a", 0);
        variation.transition(VariationStatus::Skipped).unwrap();

        let err = variation.transition(VariationStatus::Pending).unwrap_err();
        assert!(err.is_invalid_transition());
        assert_eq!(variation.status, VariationStatus::Skipped);

        assert!(variation.mark_spawned("run", "session").is_err());
        assert!(variation.run_id.is_none());
    }

    #[test]
    fn test_pending_cannot_complete_directly() {
        assert!(!VariationStatus::Pending.can_transition_to(VariationStatus::Completed));
        assert!(!VariationStatus::Pending.can_transition_to(VariationStatus::Timeout));
        assert!(VariationStatus::Pending.can_transition_to(VariationStatus::Failed));
        assert!(!VariationStatus::Spawned.can_transition_to(VariationStatus::Skipped));
    }

    #[test]
    fn test_thinking_level_parse() {
        assert_eq!("high".parse::<ThinkingLevel>().ok(), Some(ThinkingLevel::High));
        assert_eq!("OFF".parse::<ThinkingLevel>().ok(), Some(ThinkingLevel::Off));
        assert!("extreme".parse::<ThinkingLevel>().is_err());
        assert_eq!(ThinkingLevel::Minimal.to_string(), "minimal");
    }

    #[test]
    fn test_effective_prompt() {
        let variation = Variation::new("a", "a", 0)
            .with_task("Fix the parser")
            .with_additional_context("Be terse.")
            .with_constraints(vec!["No new dependencies".to_string()]);

        let prompt = variation.effective_prompt();
        assert!(prompt.starts_with("Fix the parser\n\nBe terse."));
        assert!(prompt.contains("- No new dependencies"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&VariationStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
