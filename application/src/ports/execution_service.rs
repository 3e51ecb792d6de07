//! Execution service port
//!
//! The runner never executes a variation itself. It hands the variation to
//! an execution service, receives a run handle, and polls that handle until
//! the service reports a terminal state.

use async_trait::async_trait;
use fanout_domain::{UsageStats, Variation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level faults raised by an execution service.
///
/// For scheduling purposes these are treated exactly like an `error` status:
/// the affected variation fails and the plan carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Execution rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unknown run: {0}")]
    UnknownRun(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Reply to [`ExecutionService::start`]
#[derive(Debug, Clone, PartialEq)]
pub enum StartResponse {
    Accepted { run_id: String, session_key: String },
    Error { error: String },
}

impl StartResponse {
    pub fn accepted(run_id: impl Into<String>, session_key: impl Into<String>) -> Self {
        StartResponse::Accepted {
            run_id: run_id.into(),
            session_key: session_key.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        StartResponse::Error {
            error: error.into(),
        }
    }
}

/// Quality signals a service may report alongside its output.
///
/// Everything is optional; the runner fills the gaps from the output text
/// and the scorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportedMetrics {
    pub confidence: Option<f64>,
    pub completeness: Option<f64>,
    pub code_quality: Option<f64>,
    pub responsiveness: Option<f64>,
    pub overall_score: Option<f64>,
}

/// A run the service reports as finished successfully
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletedRun {
    pub output: String,
    pub usage: Option<UsageStats>,
    pub metrics: Option<ReportedMetrics>,
}

impl CompletedRun {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: UsageStats) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_metrics(mut self, metrics: ReportedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Reply to [`ExecutionService::poll`]
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    Completed(CompletedRun),
    Running,
    Error { error: String },
    /// The service itself gave up on the run
    Timeout,
}

impl PollResponse {
    pub fn completed(output: impl Into<String>) -> Self {
        PollResponse::Completed(CompletedRun::new(output))
    }

    pub fn error(error: impl Into<String>) -> Self {
        PollResponse::Error {
            error: error.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollResponse::Running)
    }
}

/// Service that executes variations on the runner's behalf.
///
/// `poll` must be idempotent: the runner calls it repeatedly for the same
/// run until a terminal response arrives.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Launch a variation and return its run handle
    async fn start(&self, variation: &Variation) -> Result<StartResponse, ExecutionError>;

    /// Current state of a run started earlier
    async fn poll(&self, run_id: &str) -> Result<PollResponse, ExecutionError>;
}
