//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; secrets come from the
//! environment only (`BRIDGE_TOKEN`, `CLASSIFIER_API_KEY`).
//!
//! # Example
//!
//! ```no_run
//! use signal_relay::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use super::chat::{ChatConfig, ClassifierConfig};
use super::execution::{ExecutionConfig, TransportConfig};
use super::logging::LoggingConfig;
use super::reconnection::ReconnectionConfig;
use super::state::StateConfig;
use super::symbols::SymbolsConfig;
use super::trading::TradingConfig;
use crate::application::router::RoutingPolicy;
use crate::error::{ConfigError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Strategy, confidence floor and completion window.
    #[serde(default)]
    pub trading: TradingConfig,

    #[serde(default)]
    pub symbols: SymbolsConfig,

    /// Terminal transport, retry policy and health probing.
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Chat stream backoff and circuit breaker.
    #[serde(default)]
    pub reconnection: ReconnectionConfig,

    #[serde(default)]
    pub state: StateConfig,
}

impl Config {
    /// Parse configuration from TOML content and apply environment secrets.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails
    /// validation.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    fn apply_env(&mut self) {
        if let TransportConfig::Bridge(bridge) = &mut self.execution.transport {
            bridge.token = std::env::var("BRIDGE_TOKEN").ok().filter(|t| !t.is_empty());
        }
        self.classifier.api_key = std::env::var("CLASSIFIER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty());
    }

    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        let trading = &self.trading;
        if !(0.0..=1.0).contains(&trading.min_confidence) {
            return Err(invalid("min_confidence", "must be between 0 and 1"));
        }
        if trading.completion_window_secs == 0 {
            return Err(invalid("completion_window_secs", "must be greater than 0"));
        }
        if trading.default_lot_size <= Decimal::ZERO {
            return Err(invalid("default_lot_size", "must be greater than 0"));
        }

        match &self.execution.transport {
            TransportConfig::Bridge(bridge) => {
                if bridge.url.is_empty() {
                    return Err(ConfigError::MissingField { field: "url" }.into());
                }
                url::Url::parse(&bridge.url).map_err(|e| ConfigError::InvalidValue {
                    field: "url",
                    reason: e.to_string(),
                })?;
            }
            TransportConfig::Ipc(ipc) => {
                if ipc.socket_path.as_os_str().is_empty() {
                    return Err(ConfigError::MissingField {
                        field: "socket_path",
                    }
                    .into());
                }
            }
            TransportConfig::Paper(_) => {}
        }
        if self.execution.retry.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be greater than 0"));
        }
        if self.execution.retry.backoff_multiplier < 1.0 {
            return Err(invalid("backoff_multiplier", "must be >= 1.0"));
        }

        if self.chat.url.is_empty() {
            return Err(ConfigError::MissingField { field: "chat.url" }.into());
        }
        if self.chat.channels.iter().any(|c| c.trim().is_empty()) {
            return Err(invalid("channels", "channel names must not be empty"));
        }
        if self.classifier.url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "classifier.url",
            }
            .into());
        }

        let reconnection = &self.reconnection;
        if reconnection.initial_delay_ms == 0 {
            return Err(invalid("initial_delay_ms", "must be greater than 0"));
        }
        if reconnection.max_delay_ms < reconnection.initial_delay_ms {
            return Err(invalid("max_delay_ms", "must be >= initial_delay_ms"));
        }
        if reconnection.backoff_multiplier < 1.0 {
            return Err(invalid("backoff_multiplier", "must be >= 1.0"));
        }
        if reconnection.max_consecutive_failures == 0 {
            return Err(invalid("max_consecutive_failures", "must be greater than 0"));
        }
        if reconnection.circuit_breaker_cooldown_ms == 0 {
            return Err(invalid(
                "circuit_breaker_cooldown_ms",
                "must be greater than 0",
            ));
        }

        if self.state.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField { field: "state.path" }.into());
        }
        Ok(())
    }

    /// Routing knobs derived from `[trading]` and `[symbols]`.
    #[must_use]
    pub fn routing_policy(&self) -> RoutingPolicy {
        RoutingPolicy {
            min_confidence: self.trading.min_confidence,
            completion_window: self.trading.completion_window(),
            default_lot_size: self.trading.default_lot_size,
            breakeven_on_first_target: self.trading.breakeven_on_first_target,
            symbols: self.symbols.policy(),
        }
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
