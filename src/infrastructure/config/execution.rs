//! Execution transport configuration.
//!
//! The transport is picked once at startup from `[execution.transport]`:
//!
//! ```toml
//! [execution.transport]
//! type = "bridge"
//! url = "http://127.0.0.1:8710"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

/// `[execution]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Seconds between terminal health checks. 0 disables them.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
}

const fn default_health_check_interval_secs() -> u64 {
    30
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            retry: RetryConfig::default(),
            health_check_interval_secs: default_health_check_interval_secs(),
        }
    }
}

/// Which way the terminal is reached.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// JSON RPC over HTTP to a terminal bridge.
    Bridge(BridgeConfig),
    /// Newline-delimited JSON over a local Unix socket.
    Ipc(IpcConfig),
    /// In-process simulated terminal.
    Paper(PaperConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Paper(PaperConfig::default())
    }
}

impl TransportConfig {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bridge(_) => "bridge",
            Self::Ipc(_) => "ipc",
            Self::Paper(_) => "paper",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the bridge, e.g. `http://127.0.0.1:8710`.
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Bearer token, loaded from `BRIDGE_TOKEN` (never from the file).
    #[serde(skip)]
    pub token: Option<String>,
}

impl BridgeConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpcConfig {
    pub socket_path: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl IpcConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

const fn default_timeout_ms() -> u64 {
    10_000
}

/// Simulated terminal settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaperConfig {
    /// Fill price per broker symbol for market orders without an entry.
    #[serde(default)]
    pub reference_prices: BTreeMap<String, Decimal>,
}

/// Retry policy for transient terminal failures.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_retry_multiplier")]
    pub backoff_multiplier: f64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_initial_delay_ms() -> u64 {
    500
}

const fn default_retry_max_delay_ms() -> u64 {
    5_000
}

const fn default_retry_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_retry_initial_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
            backoff_multiplier: default_retry_multiplier(),
        }
    }
}
