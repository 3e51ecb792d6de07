//! Plan entity - the unit of work submitted to the runner.

use super::limits::LimitsConfig;
use super::variation::{Variation, VariationStatus};
use crate::core::error::DomainError;
use crate::selection::aggregation::AggregationStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Task metadata shared by every variation of a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
}

impl TaskSpec {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// How variations are admitted relative to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStrategy {
    /// One variation in flight at a time
    Sequential,
    /// Up to `max_concurrent_iterations` in flight
    #[default]
    Parallel,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel => write!(f, "parallel"),
        }
    }
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(ExecutionStrategy::Sequential),
            "parallel" => Ok(ExecutionStrategy::Parallel),
            _ => Err(format!(
                "Unknown execution strategy: {}. Valid: sequential, parallel",
                s
            )),
        }
    }
}

/// Plan lifecycle: `pending → running → completed | cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Cancelled)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "pending"),
            PlanStatus::Running => write!(f, "running"),
            PlanStatus::Completed => write!(f, "completed"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Rules deciding when a plan has produced enough results.
///
/// Each rule is independent; the plan is complete as soon as any configured
/// rule holds. The public constructors each set exactly one rule.
///
/// # Example
///
/// ```
/// use fanout_domain::CompletionCriteria;
///
/// let criteria = CompletionCriteria::min_successful(2);
/// assert_eq!(criteria.min_successful_variations, Some(2));
/// assert!(!criteria.wait_for_all);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionCriteria {
    /// Every variation reached a terminal status
    pub wait_for_all: bool,
    /// Some successful result scored at least this much
    pub min_acceptable_score: Option<f64>,
    /// At least one successful result exists
    pub stop_on_first_success: bool,
    /// At least this many successful results exist
    pub min_successful_variations: Option<usize>,
}

impl Default for CompletionCriteria {
    fn default() -> Self {
        Self::wait_for_all()
    }
}

impl CompletionCriteria {
    /// No rule configured; only exhaustion of work ends the plan.
    pub fn none() -> Self {
        Self {
            wait_for_all: false,
            min_acceptable_score: None,
            stop_on_first_success: false,
            min_successful_variations: None,
        }
    }

    pub fn wait_for_all() -> Self {
        Self {
            wait_for_all: true,
            ..Self::none()
        }
    }

    pub fn min_score(threshold: f64) -> Self {
        Self {
            min_acceptable_score: Some(threshold),
            ..Self::none()
        }
    }

    pub fn first_success() -> Self {
        Self {
            stop_on_first_success: true,
            ..Self::none()
        }
    }

    pub fn min_successful(count: usize) -> Self {
        Self {
            min_successful_variations: Some(count),
            ..Self::none()
        }
    }

    /// Whether any rule is configured at all
    pub fn is_empty(&self) -> bool {
        !self.wait_for_all
            && self.min_acceptable_score.is_none()
            && !self.stop_on_first_success
            && self.min_successful_variations.is_none()
    }
}

/// A set of variations plus the limits and rules governing one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub task: TaskSpec,
    pub strategy: ExecutionStrategy,
    pub variations: Vec<Variation>,
    pub limits: LimitsConfig,
    pub completion_criteria: CompletionCriteria,
    pub aggregation: AggregationStrategy,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Plan {
    /// Create a plan, rejecting empty variation lists and repeated ids.
    ///
    /// Variations without a task prompt inherit the task description.
    pub fn new(task: TaskSpec, variations: Vec<Variation>) -> Result<Self, DomainError> {
        if variations.is_empty() {
            return Err(DomainError::NoVariations);
        }

        let mut seen = HashSet::new();
        for variation in &variations {
            if !seen.insert(variation.id.as_str()) {
                return Err(DomainError::DuplicateVariation(variation.id.clone()));
            }
        }

        let variations = variations
            .into_iter()
            .map(|v| {
                if v.task.is_empty() {
                    let description = task.description.clone();
                    v.with_task(description)
                } else {
                    v
                }
            })
            .collect();

        let created_at = Utc::now();
        Ok(Self {
            id: format!("plan-{}", created_at.timestamp_millis()),
            task,
            strategy: ExecutionStrategy::default(),
            variations,
            limits: LimitsConfig::default(),
            completion_criteria: CompletionCriteria::default(),
            aggregation: AggregationStrategy::default(),
            status: PlanStatus::Pending,
            created_at,
            completed_at: None,
        })
    }

    // ==================== Builder Methods ====================

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_completion(mut self, criteria: CompletionCriteria) -> Self {
        self.completion_criteria = criteria;
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationStrategy) -> Self {
        self.aggregation = aggregation;
        self
    }

    // ==================== Lifecycle ====================

    /// `pending → running`. Returns false if the plan already left `pending`.
    pub fn start(&mut self) -> bool {
        if self.status != PlanStatus::Pending {
            return false;
        }
        self.status = PlanStatus::Running;
        true
    }

    /// Finish normally. No-op once terminal.
    pub fn complete(&mut self) -> bool {
        self.finish(PlanStatus::Completed)
    }

    /// Cancel. No-op once terminal.
    pub fn cancel(&mut self) -> bool {
        self.finish(PlanStatus::Cancelled)
    }

    fn finish(&mut self, status: PlanStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }

    // ==================== Queries ====================

    pub fn variation(&self, id: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id == id)
    }

    pub fn variation_mut(&mut self, id: &str) -> Option<&mut Variation> {
        self.variations.iter_mut().find(|v| v.id == id)
    }

    /// Ids of pending variations, lowest priority value first.
    ///
    /// The sort is stable, so equal priorities keep their declaration order.
    pub fn pending_in_priority_order(&self) -> Vec<String> {
        let mut pending: Vec<&Variation> = self
            .variations
            .iter()
            .filter(|v| v.status == VariationStatus::Pending)
            .collect();
        pending.sort_by_key(|v| v.priority);
        pending.into_iter().map(|v| v.id.clone()).collect()
    }

    pub fn count_with_status(&self, status: VariationStatus) -> usize {
        self.variations.iter().filter(|v| v.status == status).count()
    }

    pub fn all_terminal(&self) -> bool {
        self.variations.iter().all(|v| v.status.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with(ids: &[(&str, u32)]) -> Plan {
        let variations = ids
            .iter()
            .map(|(id, priority)| Variation::new(*id, *id, *priority))
            .collect();
        Plan::new(TaskSpec::new("Refactor", "Refactor the parser"), variations).unwrap()
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let variations = vec![Variation::new("a", "a", 0), Variation::new("a", "b", 1)];
        let err = Plan::new(TaskSpec::default(), variations).unwrap_err();
        assert_eq!(err, DomainError::DuplicateVariation("a".to_string()));
    }

    #[test]
    fn test_empty_plan_rejected() {
        let err = Plan::new(TaskSpec::default(), vec![]).unwrap_err();
        assert_eq!(err, DomainError::NoVariations);
    }

    #[test]
    fn test_variations_inherit_task_description() {
        let plan = plan_with(&[("a", 0)]);
        assert_eq!(plan.variations[0].task, "Refactor the parser");
    }

    #[test]
    fn test_priority_order_is_stable() {
        let plan = plan_with(&[("c", 2), ("a", 0), ("b", 0), ("d", 1)]);
        assert_eq!(plan.pending_in_priority_order(), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_terminal_status_set_once() {
        let mut plan = plan_with(&[("a", 0)]);
        assert!(plan.start());
        assert!(!plan.start());

        assert!(plan.cancel());
        let stamped = plan.completed_at;
        assert!(stamped.is_some());

        assert!(!plan.complete());
        assert_eq!(plan.status, PlanStatus::Cancelled);
        assert_eq!(plan.completed_at, stamped);
    }

    #[test]
    fn test_completion_criteria_constructors() {
        assert!(CompletionCriteria::default().wait_for_all);
        assert!(CompletionCriteria::none().is_empty());
        assert_eq!(
            CompletionCriteria::min_score(0.9).min_acceptable_score,
            Some(0.9)
        );
        assert!(CompletionCriteria::first_success().stop_on_first_success);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "Sequential".parse::<ExecutionStrategy>().ok(),
            Some(ExecutionStrategy::Sequential)
        );
        assert!("round-robin".parse::<ExecutionStrategy>().is_err());
    }
}
