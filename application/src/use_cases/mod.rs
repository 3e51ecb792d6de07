//! Use cases
//!
//! - [`run_iterations`]: execute a plan's variations in parallel and aggregate them

pub mod run_iterations;
