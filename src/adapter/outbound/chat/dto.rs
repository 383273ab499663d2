//! Relay wire frames.

use serde::{Deserialize, Serialize};

use crate::domain::message::ChatMessage;
use crate::port::outbound::chat::ChannelSubscription;

/// Client-to-relay frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayRequest {
    Subscribe { channels: Vec<RelayChannel> },
}

#[derive(Debug, Serialize)]
pub struct RelayChannel {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<i64>,
}

impl RelayRequest {
    #[must_use]
    pub fn subscribe(channels: &[ChannelSubscription]) -> Self {
        Self::Subscribe {
            channels: channels
                .iter()
                .map(|sub| RelayChannel {
                    channel: sub.channel.as_str().to_string(),
                    after: sub.after.map(|id| id.get()),
                })
                .collect(),
        }
    }
}

/// Relay-to-client frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Message(ChatMessage),
    Error { message: String },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::{ChannelId, MessageId};

    #[test]
    fn subscribe_carries_resume_cursor() {
        let request = RelayRequest::subscribe(&[
            ChannelSubscription {
                channel: ChannelId::new("gold"),
                after: Some(MessageId::new(500)),
            },
            ChannelSubscription {
                channel: ChannelId::new("fx"),
                after: None,
            },
        ]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "subscribe");
        assert_eq!(json["channels"][0]["after"], 500);
        assert!(json["channels"][1].get("after").is_none());
    }

    #[test]
    fn message_frame_parses_into_chat_message() {
        let frame: RelayFrame = serde_json::from_str(
            r#"{"type":"message","channel":"gold","id":501,"reply_to":480,
                "text":"GOLD BUY NOW","edited":true,"date":"2026-03-02T09:15:00Z"}"#,
        )
        .unwrap();
        let RelayFrame::Message(message) = frame else {
            panic!("expected a message frame");
        };
        assert_eq!(message.id, MessageId::new(501));
        assert_eq!(message.reply_to, Some(MessageId::new(480)));
        assert!(message.edited);
    }

    #[test]
    fn unknown_frames_are_tolerated() {
        let frame: RelayFrame = serde_json::from_str(r#"{"type":"typing","channel":"gold"}"#).unwrap();
        assert!(matches!(frame, RelayFrame::Unknown));
    }
}
