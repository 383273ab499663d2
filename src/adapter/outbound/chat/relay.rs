//! WebSocket chat relay stream.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use super::dto::{RelayFrame, RelayRequest};
use crate::error::{Error, Result};
use crate::port::outbound::chat::{ChannelSubscription, ChatEvent, ChatStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`ChatStream`] over the relay's WebSocket.
pub struct RelayChatStream {
    url: String,
    ws: Option<Socket>,
}

impl RelayChatStream {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ws: None,
        }
    }

    fn disconnected(&mut self, reason: impl Into<String>) -> ChatEvent {
        self.ws = None;
        ChatEvent::Disconnected {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ChatStream for RelayChatStream {
    async fn connect(&mut self) -> Result<()> {
        info!(url = %self.url, "Connecting to chat relay");
        let (ws, response) = connect_async(&self.url).await?;
        info!(status = %response.status(), "Chat relay connected");
        self.ws = Some(ws);
        Ok(())
    }

    async fn subscribe(&mut self, channels: &[ChannelSubscription]) -> Result<()> {
        let ws = self
            .ws
            .as_mut()
            .ok_or_else(|| Error::Connection("Not connected".into()))?;

        let json = serde_json::to_string(&RelayRequest::subscribe(channels))?;
        info!(
            channels = ?channels.iter().map(|c| c.channel.as_str()).collect::<Vec<_>>(),
            "Subscribing to channels"
        );
        ws.send(Message::Text(json)).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChatEvent> {
        loop {
            let frame = self.ws.as_mut()?.next().await;
            match frame {
                None => return Some(self.disconnected("stream ended")),
                Some(Ok(Message::Text(text))) => {
                    trace!(bytes = text.len(), "Received relay frame");
                    match serde_json::from_str::<RelayFrame>(&text) {
                        Ok(RelayFrame::Message(message)) => return Some(ChatEvent::Message(message)),
                        Ok(RelayFrame::Error { message }) => {
                            warn!(error = %message, "Relay reported an error");
                        }
                        Ok(RelayFrame::Unknown) => {}
                        Err(e) => warn!(error = %e, bytes = text.len(), "Failed to parse relay frame"),
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!("Received WebSocket ping");
                    let ws = self.ws.as_mut()?;
                    if ws.send(Message::Pong(data)).await.is_err() {
                        return Some(self.disconnected("failed to send pong"));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(frame = ?frame, "Chat relay closed the connection");
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    return Some(self.disconnected(reason));
                }
                Some(Ok(_)) => debug!("Ignoring non-text relay frame"),
                Some(Err(e)) => {
                    error!(error = %e, "Chat relay error");
                    return Some(self.disconnected(e.to_string()));
                }
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "relay"
    }
}
