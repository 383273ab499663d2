//! Raw chat messages as delivered by the chat source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, MessageId};

/// One chat message, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub channel: ChannelId,
    pub id: MessageId,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
    pub text: String,
    /// True when this delivery is an edit of an earlier message.
    #[serde(default)]
    pub edited: bool,
    pub date: DateTime<Utc>,
}
