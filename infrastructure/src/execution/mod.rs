//! Execution service adapters
//!
//! [`ProcessExecutionService`] runs each variation as a local child process.

mod process;

pub use process::{MAX_OUTPUT_BYTES, ProcessConfig, ProcessExecutionService};
