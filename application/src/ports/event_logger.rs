//! Port for structured iteration event logging.
//!
//! Records what the runner decided and observed (plan start, each spawn,
//! skip and finish, plan end) in a machine-readable form. This is separate
//! from `tracing`-based diagnostics: tracing is for humans reading the
//! terminal, this port is for tooling replaying a run.

use serde_json::Value;

/// A structured runner event.
///
/// Each event has a type string and a JSON payload with event-specific
/// fields. Adapters add the timestamp when they write it.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationEvent {
    /// Event type identifier (e.g. "plan_started", "variation_finished").
    pub event_type: &'static str,
    pub payload: Value,
}

impl IterationEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }
}

/// Port for logging runner events.
///
/// `log` is synchronous and infallible. Adapters swallow their own write
/// failures so a full disk never interrupts a plan.
pub trait IterationEventLogger: Send + Sync {
    fn log(&self, event: IterationEvent);
}

/// No-op implementation for tests and when event logging is disabled.
pub struct NoIterationLogger;

impl IterationEventLogger for NoIterationLogger {
    fn log(&self, _event: IterationEvent) {}
}
