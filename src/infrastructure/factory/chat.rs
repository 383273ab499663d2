//! Chat stream and classifier factories.

use std::sync::Arc;

use crate::adapter::outbound::chat::relay::RelayChatStream;
use crate::adapter::outbound::classifier::http::HttpClassifier;
use crate::application::status::RuntimeStatus;
use crate::domain::id::ChannelId;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::reconnecting::ReconnectingChatStream;
use crate::port::outbound::classifier::SignalClassifier;

/// Relay stream with reconnection, reporting health to `status`.
#[must_use]
pub fn build_chat_stream(
    config: &Config,
    status: Arc<RuntimeStatus>,
) -> ReconnectingChatStream<RelayChatStream> {
    ReconnectingChatStream::new(
        RelayChatStream::new(config.chat.url.clone()),
        config.reconnection.clone(),
    )
    .with_health(status)
}

/// Channels to follow, as configured.
#[must_use]
pub fn channels(config: &Config) -> Vec<ChannelId> {
    config
        .chat
        .channels
        .iter()
        .map(|c| ChannelId::new(c.trim()))
        .collect()
}

/// # Errors
///
/// Returns an error if the classifier URL is invalid.
pub fn build_classifier(config: &Config) -> Result<Arc<dyn SignalClassifier>> {
    let classifier = &config.classifier;
    Ok(Arc::new(HttpClassifier::new(
        &classifier.url,
        classifier.timeout(),
        classifier.api_key.clone(),
    )?))
}
