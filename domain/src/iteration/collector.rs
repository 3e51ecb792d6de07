//! Result collection and completion-criteria evaluation.

use super::plan::{CompletionCriteria, Plan};
use super::result::IterationResult;
use super::variation::VariationStatus;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::warn;

/// Callback invoked for every recorded result
pub type ResultListener = Arc<dyn Fn(&IterationResult) + Send + Sync>;

/// Variation counts derived from status alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total: usize,
    pub pending: usize,
    pub spawned: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
}

/// Sole writer of a plan's results.
///
/// Owns the [`Plan`] so that recording a result and updating the matching
/// variation's status happen together.
pub struct ResultCollector {
    plan: Plan,
    results: Vec<IterationResult>,
    by_variation: HashMap<String, usize>,
    listeners: Vec<ResultListener>,
}

impl ResultCollector {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            results: Vec::new(),
            by_variation: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn plan_mut(&mut self) -> &mut Plan {
        &mut self.plan
    }

    /// Register a listener. Listeners run synchronously inside
    /// [`add_result`](Self::add_result) or [`notify_result_listeners`]; a
    /// panicking listener is logged and does not affect collection or the
    /// other listeners.
    pub fn on_result(&mut self, listener: ResultListener) {
        self.listeners.push(listener);
    }

    /// Record a finished variation's outcome and notify listeners.
    ///
    /// The matching variation moves to `completed`, `timeout` or `failed`.
    pub fn add_result(&mut self, result: IterationResult) -> Result<(), DomainError> {
        self.insert_result(result)?;
        if let Some(recorded) = self.results.last() {
            notify_result_listeners(&self.listeners, recorded);
        }
        Ok(())
    }

    /// Record an outcome like [`add_result`](Self::add_result) but leave the
    /// listeners alone.
    ///
    /// For owners that keep the collector behind a lock: record under the
    /// lock, clone [`listeners`](Self::listeners), release it, then call
    /// [`notify_result_listeners`].
    pub fn insert_result(&mut self, result: IterationResult) -> Result<(), DomainError> {
        if self.by_variation.contains_key(&result.variation_id) {
            return Err(DomainError::DuplicateResult(result.variation_id));
        }

        let next = if result.success {
            VariationStatus::Completed
        } else if result.timed_out {
            VariationStatus::Timeout
        } else {
            VariationStatus::Failed
        };

        let variation = self
            .plan
            .variation_mut(&result.variation_id)
            .ok_or_else(|| DomainError::UnknownVariation(result.variation_id.clone()))?;
        if variation.status != next {
            variation.transition(next)?;
        }

        self.by_variation
            .insert(result.variation_id.clone(), self.results.len());
        self.results.push(result);
        Ok(())
    }

    pub fn listeners(&self) -> &[ResultListener] {
        &self.listeners
    }

    pub fn results(&self) -> &[IterationResult] {
        &self.results
    }

    pub fn get_result(&self, variation_id: &str) -> Option<&IterationResult> {
        self.by_variation
            .get(variation_id)
            .and_then(|&index| self.results.get(index))
    }

    pub fn successful(&self) -> impl Iterator<Item = &IterationResult> {
        self.results.iter().filter(|r| r.success)
    }

    /// Highest-scoring successful result; ties go to the one recorded first.
    pub fn best_result(&self) -> Option<&IterationResult> {
        best_of(self.successful())
    }

    /// Evaluate the plan's own completion criteria.
    pub fn is_complete(&self) -> bool {
        self.is_complete_with(&self.plan.completion_criteria)
    }

    /// Evaluate an arbitrary set of criteria against the current state.
    /// True as soon as any configured rule holds.
    pub fn is_complete_with(&self, criteria: &CompletionCriteria) -> bool {
        if criteria.wait_for_all && self.plan.all_terminal() {
            return true;
        }
        if let Some(threshold) = criteria.min_acceptable_score
            && self.successful().any(|r| r.score() >= threshold)
        {
            return true;
        }
        if criteria.stop_on_first_success && self.successful().next().is_some() {
            return true;
        }
        if let Some(required) = criteria.min_successful_variations
            && self.successful().count() >= required
        {
            return true;
        }
        false
    }

    pub fn summary(&self) -> PlanSummary {
        let plan = &self.plan;
        PlanSummary {
            total: plan.variations.len(),
            pending: plan.count_with_status(VariationStatus::Pending),
            spawned: plan.count_with_status(VariationStatus::Spawned),
            completed: plan.count_with_status(VariationStatus::Completed),
            failed: plan.count_with_status(VariationStatus::Failed),
            timed_out: plan.count_with_status(VariationStatus::Timeout),
            skipped: plan.count_with_status(VariationStatus::Skipped),
        }
    }
}

/// First maximum by overall score. Scores are never NaN (they are clamped on
/// construction), so a strict `>` keeps insertion order on ties.
pub(crate) fn best_of<'a>(
    results: impl Iterator<Item = &'a IterationResult>,
) -> Option<&'a IterationResult> {
    results.fold(None, |best: Option<&IterationResult>, candidate| match best {
        Some(current) if candidate.score() <= current.score() => Some(current),
        _ => Some(candidate),
    })
}

/// Run each listener on `result`. A panicking listener is logged and the
/// rest still run.
pub fn notify_result_listeners(listeners: &[ResultListener], result: &IterationResult) {
    for (index, listener) in listeners.iter().enumerate() {
        if catch_unwind(AssertUnwindSafe(|| listener(result))).is_err() {
            warn!(
                listener = index,
                variation_id = %result.variation_id,
                "Result listener panicked; continuing"
            );
        }
    }
}
