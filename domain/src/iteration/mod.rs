//! Parallel iteration domain
//!
//! A [`Plan`](plan::Plan) runs several variations of the same task, each
//! differing by model, reasoning depth or prompt framing, and keeps the
//! outcomes for aggregation.
//!
//! ```text
//! VariationFactory ──► Plan ──► LimitEnforcer (admission)
//!                        │
//!                        └────► ResultCollector ──► completion criteria
//! ```

pub mod collector;
pub mod factory;
pub mod limits;
pub mod plan;
pub mod result;
pub mod variation;

pub use collector::{PlanSummary, ResultCollector, ResultListener, notify_result_listeners};
pub use factory::{HybridConfig, PromptVariant, VariationFactory};
pub use limits::{DenialReason, LimitEnforcer, LimitsConfig, SpawnDecision};
pub use plan::{CompletionCriteria, ExecutionStrategy, Plan, PlanStatus, TaskSpec};
pub use result::{IterationResult, OutputType, ResultMetrics, UsageStats};
pub use variation::{ThinkingLevel, Variation, VariationStatus};
