//! Infrastructure layer for fanout
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use config::{
    ConfigLoader, FileCompletionConfig, FileConfig, FileExecutionConfig, FileLimitsConfig,
    FileLoggingConfig, FileRunnerConfig,
};
pub use execution::{MAX_OUTPUT_BYTES, ProcessConfig, ProcessExecutionService};
pub use logging::JsonlIterationLogger;
