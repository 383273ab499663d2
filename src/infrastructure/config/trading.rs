//! Routing knobs: strategy, confidence floor, completion window, volume.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::strategy::StrategyKind;

/// Trading behaviour settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Exit strategy: `dual_target` (scalp + runner) or `single`.
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Signals classified below this confidence are not acted on.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Seconds an incomplete signal may wait for its stop-loss and targets.
    #[serde(default = "default_completion_window_secs")]
    pub completion_window_secs: u64,
    /// Volume per leg when the signal names none.
    #[serde(default = "default_lot_size")]
    pub default_lot_size: Decimal,
    /// Move the runner to break-even when the first target is hit.
    #[serde(default = "default_true")]
    pub breakeven_on_first_target: bool,
}

const fn default_min_confidence() -> f64 {
    0.7
}

const fn default_completion_window_secs() -> u64 {
    120
}

fn default_lot_size() -> Decimal {
    Decimal::new(1, 2)
}

const fn default_true() -> bool {
    true
}

impl TradingConfig {
    #[must_use]
    pub const fn completion_window(&self) -> Duration {
        Duration::from_secs(self.completion_window_secs)
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            min_confidence: default_min_confidence(),
            completion_window_secs: default_completion_window_secs(),
            default_lot_size: default_lot_size(),
            breakeven_on_first_target: default_true(),
        }
    }
}
