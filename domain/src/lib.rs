//! Domain layer for fanout
//!
//! This crate contains the core model and algorithms for running several
//! variations of one task side by side. It has no dependencies on
//! infrastructure or presentation concerns and performs no I/O.
//!
//! # Core Concepts
//!
//! ## Iteration
//!
//! - **Variation**: one parameterized attempt at the task (model, thinking
//!   level, prompt framing)
//! - **Plan**: the variations plus limits and completion criteria
//! - **LimitEnforcer**: admission control over concurrency, totals, time,
//!   cost and tokens
//! - **ResultCollector**: the single writer of results and variation status
//!
//! ## Selection
//!
//! - **Scoring**: one result to a score in [0,1]
//! - **Aggregation**: many results to one answer (best, voting, consensus,
//!   ensemble)

pub mod config;
pub mod core;
pub mod iteration;
pub mod selection;
pub mod util;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
pub use core::error::DomainError;
pub use iteration::{
    CompletionCriteria, DenialReason, ExecutionStrategy, HybridConfig, IterationResult,
    LimitEnforcer, LimitsConfig, OutputType, Plan, PlanStatus, PlanSummary, PromptVariant,
    ResultCollector, ResultListener, ResultMetrics, SpawnDecision, TaskSpec, ThinkingLevel,
    UsageStats, Variation, VariationFactory, VariationStatus, notify_result_listeners,
};
pub use selection::{
    AggregatedResult, AggregationStrategy, ScoringConfig, aggregate,
    parse_confidence_from_output, score_result,
};
