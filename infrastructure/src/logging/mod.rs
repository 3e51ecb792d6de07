//! Logging infrastructure: structured runner event log.
//!
//! Provides [`JsonlIterationLogger`], a JSONL file writer that implements
//! the [`IterationEventLogger`](fanout_application::IterationEventLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlIterationLogger;
