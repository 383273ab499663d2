//! Reconnecting wrapper for [`ChatStream`].
//!
//! Disconnects and stream ends are absorbed: the wrapper waits out a backoff
//! delay, reconnects, and resubscribes every channel from the newest message
//! it has delivered so far. A circuit breaker pauses attempts after too many
//! consecutive failures.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::application::backoff::Backoff;
use crate::application::status::RuntimeStatus;
use crate::domain::id::{ChannelId, MessageId};
use crate::error::Result;
use crate::infrastructure::config::reconnection::ReconnectionConfig;
use crate::port::outbound::chat::{ChannelSubscription, ChatEvent, ChatStream};

/// Component name reported to [`RuntimeStatus`] while disconnected.
pub const CHAT_COMPONENT: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { until: Instant },
}

pub struct ReconnectingChatStream<S> {
    inner: S,
    config: ReconnectionConfig,
    backoff: Backoff,
    subscriptions: Vec<ChannelSubscription>,
    /// Newest message delivered per channel.
    seen: BTreeMap<ChannelId, MessageId>,
    consecutive_failures: u32,
    circuit: CircuitState,
    connected: bool,
    status: Option<Arc<RuntimeStatus>>,
}

impl<S: ChatStream> ReconnectingChatStream<S> {
    pub fn new(inner: S, config: ReconnectionConfig) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            inner,
            config,
            backoff,
            subscriptions: Vec::new(),
            seen: BTreeMap::new(),
            consecutive_failures: 0,
            circuit: CircuitState::Closed,
            connected: false,
            status: None,
        }
    }

    /// Report connection health to `status`.
    #[must_use]
    pub fn with_health(mut self, status: Arc<RuntimeStatus>) -> Self {
        self.status = Some(status);
        self
    }

    fn mark_connected(&mut self) {
        self.connected = true;
        self.consecutive_failures = 0;
        self.backoff.reset();
        self.circuit = CircuitState::Closed;
        if let Some(status) = &self.status {
            status.mark_recovered(CHAT_COMPONENT);
        }
    }

    fn record_failure(&mut self) {
        self.connected = false;
        self.consecutive_failures += 1;
        if let Some(status) = &self.status {
            status.mark_degraded(CHAT_COMPONENT);
        }

        if self.consecutive_failures >= self.config.max_consecutive_failures {
            let cooldown = Duration::from_millis(self.config.circuit_breaker_cooldown_ms);
            self.circuit = CircuitState::Open {
                until: Instant::now() + cooldown,
            };
            error!(
                failures = self.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Circuit breaker tripped, pausing reconnection attempts"
            );
        }
    }

    /// Subscriptions resuming after the newest delivered message.
    fn resume_subscriptions(&self) -> Vec<ChannelSubscription> {
        self.subscriptions
            .iter()
            .map(|sub| ChannelSubscription {
                channel: sub.channel.clone(),
                after: sub.after.max(self.seen.get(&sub.channel).copied()),
            })
            .collect()
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let CircuitState::Open { until } = self.circuit {
            let remaining = until.saturating_duration_since(Instant::now());
            warn!(
                remaining_secs = remaining.as_secs(),
                "Circuit breaker open, waiting for cooldown"
            );
            sleep(remaining).await;
            self.circuit = CircuitState::Closed;
            self.consecutive_failures = 0;
            self.backoff.reset();
        }

        let delay = self.backoff.next_delay();
        info!(
            delay_ms = delay.as_millis(),
            attempt = self.consecutive_failures + 1,
            "Reconnecting chat stream after delay"
        );
        sleep(delay).await;

        if let Err(e) = self.inner.connect().await {
            error!(error = %e, "Chat reconnection failed");
            self.record_failure();
            return Err(e);
        }

        let subscriptions = self.resume_subscriptions();
        if !subscriptions.is_empty() {
            debug!(channels = subscriptions.len(), "Resubscribing to channels");
            if let Err(e) = self.inner.subscribe(&subscriptions).await {
                error!(error = %e, "Resubscribe failed after reconnect");
                self.record_failure();
                return Err(e);
            }
        }

        info!("Chat stream reconnected");
        self.mark_connected();
        Ok(())
    }
}

#[async_trait]
impl<S: ChatStream> ChatStream for ReconnectingChatStream<S> {
    async fn connect(&mut self) -> Result<()> {
        let result = self.inner.connect().await;
        if result.is_ok() {
            self.mark_connected();
        }
        result
    }

    async fn subscribe(&mut self, channels: &[ChannelSubscription]) -> Result<()> {
        self.subscriptions = channels.to_vec();
        self.inner.subscribe(channels).await
    }

    async fn next_event(&mut self) -> Option<ChatEvent> {
        loop {
            if !self.connected {
                if let Err(e) = self.reconnect().await {
                    warn!(error = %e, "Reconnection attempt failed, will retry");
                    continue;
                }
            }

            match self.inner.next_event().await {
                Some(ChatEvent::Message(message)) => {
                    let newest = self.seen.entry(message.channel.clone()).or_insert(message.id);
                    *newest = (*newest).max(message.id);
                    return Some(ChatEvent::Message(message));
                }
                Some(ChatEvent::Disconnected { reason }) => {
                    warn!(reason = %reason, "Chat connection lost, will reconnect");
                    self.record_failure();
                }
                None => {
                    warn!("Chat stream ended unexpectedly, will reconnect");
                    self.record_failure();
                }
            }
        }
    }

    fn source_name(&self) -> &'static str {
        self.inner.source_name()
    }
}
