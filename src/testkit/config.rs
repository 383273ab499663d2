//! Canonical test configurations.

use crate::infrastructure::config::reconnection::ReconnectionConfig;
use crate::infrastructure::config::settings::Config;

/// Reconnection config with zero delays.
pub fn reconnection() -> ReconnectionConfig {
    ReconnectionConfig {
        initial_delay_ms: 0,
        max_delay_ms: 0,
        backoff_multiplier: 1.0,
        max_consecutive_failures: 3,
        circuit_breaker_cooldown_ms: 0,
    }
}

/// Defaults with the given channels and the paper terminal.
pub fn config(channels: &[&str]) -> Config {
    let mut config = Config::default();
    config.chat.channels = channels.iter().map(|c| (*c).to_string()).collect();
    config
}
