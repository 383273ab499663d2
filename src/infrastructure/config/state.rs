//! Durable state location and retention.

use std::path::PathBuf;

use serde::Deserialize;

/// `[state]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// State file. The instance lock lives next to it as `<path>.lock`.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
    /// Closed signals kept in the file for follow-up matching.
    #[serde(default = "default_max_closed_records")]
    pub max_closed_records: usize,
}

/// `$XDG_DATA_HOME/signal-relay/state.json`, or `./state.json` without a data dir.
#[must_use]
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("signal-relay").join("state.json"))
        .unwrap_or_else(|| PathBuf::from("state.json"))
}

const fn default_max_closed_records() -> usize {
    20
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            max_closed_records: default_max_closed_records(),
        }
    }
}
