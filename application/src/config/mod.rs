//! Application-level configuration.
//!
//! - [`RunnerParams`]: control loop knobs (poll interval, scoring weights)

pub mod runner_params;

pub use runner_params::RunnerParams;
