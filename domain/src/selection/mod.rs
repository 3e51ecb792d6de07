//! Judging and combining iteration results
//!
//! Once variations finish, their outputs are scored and reduced to a single
//! answer.
//!
//! ```text
//! output text ──► parsing (confidence) ──┐
//!                                        ▼
//! IterationResult ──► scoring ──► overall score ──► aggregation ──► AggregatedResult
//! ```

pub mod aggregation;
pub mod parsing;
pub mod scoring;

pub use aggregation::{AggregatedResult, AggregationStrategy, aggregate};
pub use parsing::parse_confidence_from_output;
pub use scoring::{ScoringConfig, score_result};
