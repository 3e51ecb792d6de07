//! Configuration value objects for the domain layer
//!
//! These describe problems found while turning raw configuration into
//! domain values. They are produced by the infrastructure layer and acted
//! upon by the binary.

pub mod validation;

pub use validation::{ConfigIssue, ConfigIssueCode, Severity, has_errors};
