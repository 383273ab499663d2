//! Chat relay and classifier endpoints.

use std::time::Duration;

use serde::Deserialize;

/// `[chat]` section: where messages come from.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// WebSocket URL of the chat relay.
    #[serde(default = "default_relay_url")]
    pub url: String,
    /// Channels to follow.
    #[serde(default)]
    pub channels: Vec<String>,
}

fn default_relay_url() -> String {
    "ws://127.0.0.1:8720/ws".into()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            channels: Vec::new(),
        }
    }
}

/// `[classifier]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Base URL of the classification service.
    #[serde(default = "default_classifier_url")]
    pub url: String,
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
    /// Loaded from `CLASSIFIER_API_KEY` (never from the file).
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_classifier_url() -> String {
    "http://127.0.0.1:8730".into()
}

const fn default_classifier_timeout_ms() -> u64 {
    15_000
}

impl ClassifierConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: default_classifier_url(),
            timeout_ms: default_classifier_timeout_ms(),
            api_key: None,
        }
    }
}
