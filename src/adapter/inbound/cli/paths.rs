//! Default locations.
//!
//! - `$XDG_CONFIG_HOME/signal-relay/config.toml`: configuration
//! - `$XDG_DATA_HOME/signal-relay/state.json`: durable state (see
//!   [`default_state_path`](crate::infrastructure::config::state::default_state_path))

use std::path::PathBuf;

/// `$XDG_CONFIG_HOME/signal-relay/`, or the working directory without one.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("signal-relay"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the default config file path.
pub fn default_config() -> PathBuf {
    config_dir().join("config.toml")
}
