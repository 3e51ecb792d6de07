//! Event log configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw logging configuration from TOML
///
/// ```toml
/// [logging]
/// event_log = "~/.local/state/fanout/events.jsonl"
/// ```
///
/// A leading `~/` is expanded to the home directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL file receiving runner events; unset disables the event log
    pub event_log: Option<PathBuf>,
}

impl FileLoggingConfig {
    pub fn event_log_path(&self) -> Option<PathBuf> {
        let path = self.event_log.as_ref()?;
        if let Ok(rest) = path.strip_prefix("~")
            && let Some(home) = dirs::home_dir()
        {
            return Some(home.join(rest));
        }
        Some(path.clone())
    }
}
