//! Chat source port.

use async_trait::async_trait;

use crate::domain::id::{ChannelId, MessageId};
use crate::domain::message::ChatMessage;
use crate::error::Result;

/// Channel to follow and where to resume it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubscription {
    pub channel: ChannelId,
    /// Replay messages after this one.
    pub after: Option<MessageId>,
}

/// Events emitted by a chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message(ChatMessage),
    Disconnected { reason: String },
}

/// Stream of chat messages.
///
/// Implementations connect, accept a subscription and then yield events.
/// `None` from [`next_event`](ChatStream::next_event) means the stream ended.
#[async_trait]
pub trait ChatStream: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn subscribe(&mut self, channels: &[ChannelSubscription]) -> Result<()>;

    async fn next_event(&mut self) -> Option<ChatEvent>;

    fn source_name(&self) -> &'static str;
}

#[async_trait]
impl ChatStream for Box<dyn ChatStream> {
    async fn connect(&mut self) -> Result<()> {
        (**self).connect().await
    }

    async fn subscribe(&mut self, channels: &[ChannelSubscription]) -> Result<()> {
        (**self).subscribe(channels).await
    }

    async fn next_event(&mut self) -> Option<ChatEvent> {
        (**self).next_event().await
    }

    fn source_name(&self) -> &'static str {
        (**self).source_name()
    }
}
