//! Application layer for fanout
//!
//! This crate contains the runner use case, the ports it drives, and its
//! configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::RunnerParams;
pub use ports::{
    event_logger::{IterationEvent, IterationEventLogger, NoIterationLogger},
    execution_service::{
        CompletedRun, ExecutionError, ExecutionService, PollResponse, ReportedMetrics,
        StartResponse,
    },
};
pub use use_cases::run_iterations::{
    LOCAL_TIMEOUT_ERROR, RunIterationsError, RunIterationsUseCase, RunnerStatus,
    SERVICE_TIMEOUT_ERROR, SpawnListener,
};
