//! Symbol allow-list and broker symbol mapping.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::domain::symbol::SymbolPolicy;

/// `[symbols]` section.
///
/// ```toml
/// [symbols]
/// allowed = ["XAUUSD", "EURUSD"]
///
/// [symbols.map]
/// XAUUSD = "XAUUSDm"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolsConfig {
    /// Symbols new entries may use. Empty allows every symbol.
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Signal symbol to broker symbol.
    #[serde(default)]
    pub map: BTreeMap<String, String>,
}

impl SymbolsConfig {
    #[must_use]
    pub fn policy(&self) -> SymbolPolicy {
        SymbolPolicy::new(
            self.allowed.iter().map(String::as_str),
            self.map.iter().map(|(k, v)| (k.as_str(), v.clone())),
        )
    }
}
