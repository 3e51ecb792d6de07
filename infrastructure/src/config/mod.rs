//! Configuration file loading for fanout
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. Environment: `FANOUT_<SECTION>__<KEY>` (e.g. `FANOUT_LIMITS__MAX_TOTAL_ITERATIONS=4`)
//! 2. `--config <path>` specified file
//! 3. Project root: `./fanout.toml` or `./.fanout.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/fanout/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileCompletionConfig, FileConfig, FileExecutionConfig, FileLimitsConfig, FileLoggingConfig,
    FileRunnerConfig,
};
pub use loader::ConfigLoader;
