//! Symbol allow-list and signal-to-broker symbol mapping.

use std::collections::{BTreeMap, BTreeSet};

/// Which symbols may be traded and what the broker calls them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolPolicy {
    /// Upper-cased signal symbols allowed for new entries. Empty allows all.
    allowed: BTreeSet<String>,
    /// Upper-cased signal symbol to broker symbol.
    broker_names: BTreeMap<String, String>,
}

impl SymbolPolicy {
    #[must_use]
    pub fn new<A, M, K, V>(allowed: A, broker_names: M) -> Self
    where
        A: IntoIterator<Item = K>,
        M: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .collect(),
            broker_names: broker_names
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_uppercase(), v.into()))
                .collect(),
        }
    }

    /// Broker symbol for `symbol`, or `None` when it is not allowed.
    #[must_use]
    pub fn resolve(&self, symbol: &str) -> Option<String> {
        let key = symbol.trim().to_uppercase();
        if !self.allowed.is_empty() && !self.allowed.contains(&key) {
            return None;
        }
        Some(self.broker_names.get(&key).cloned().unwrap_or(key))
    }
}
