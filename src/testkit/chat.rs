//! Mock [`ChatStream`] implementations.
//!
//! - [`ScriptedChat`]: fixed connect/subscribe results and a fixed event
//!   queue. The stream ends when the queue is empty.
//! - [`ChannelChat`]: events pushed from the test through a
//!   [`ChannelChatHandle`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::port::outbound::chat::{ChannelSubscription, ChatEvent, ChatStream};

/// Subscriptions received by a mock stream, shared with the test.
pub type SubscriptionLog = Arc<Mutex<Vec<Vec<ChannelSubscription>>>>;

pub struct ScriptedChat {
    connect_results: VecDeque<Result<()>>,
    subscribe_results: VecDeque<Result<()>>,
    events: VecDeque<ChatEvent>,
    connects: Arc<AtomicU32>,
    subscriptions: SubscriptionLog,
}

impl ScriptedChat {
    pub fn new(events: Vec<ChatEvent>) -> Self {
        Self {
            connect_results: VecDeque::new(),
            subscribe_results: VecDeque::new(),
            events: events.into(),
            connects: Arc::new(AtomicU32::new(0)),
            subscriptions: SubscriptionLog::default(),
        }
    }

    pub fn with_connect_results(mut self, results: Vec<Result<()>>) -> Self {
        self.connect_results = results.into();
        self
    }

    pub fn with_subscribe_results(mut self, results: Vec<Result<()>>) -> Self {
        self.subscribe_results = results.into();
        self
    }

    pub fn connect_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.connects)
    }

    pub fn subscriptions(&self) -> SubscriptionLog {
        Arc::clone(&self.subscriptions)
    }
}

#[async_trait]
impl ChatStream for ScriptedChat {
    async fn connect(&mut self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    async fn subscribe(&mut self, channels: &[ChannelSubscription]) -> Result<()> {
        self.subscriptions.lock().push(channels.to_vec());
        self.subscribe_results.pop_front().unwrap_or(Ok(()))
    }

    async fn next_event(&mut self) -> Option<ChatEvent> {
        self.events.pop_front()
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Channel-backed stream. Sending `None` ends it.
pub struct ChannelChat {
    rx: mpsc::Receiver<Option<ChatEvent>>,
    subscriptions: SubscriptionLog,
}

#[derive(Clone)]
pub struct ChannelChatHandle {
    tx: mpsc::Sender<Option<ChatEvent>>,
    subscriptions: SubscriptionLog,
}

impl ChannelChatHandle {
    /// Deliver `event` to the stream.
    pub async fn send(&self, event: ChatEvent) {
        let _ = self.tx.send(Some(event)).await;
    }

    /// End the stream.
    pub async fn end(&self) {
        let _ = self.tx.send(None).await;
    }

    pub fn subscriptions(&self) -> Vec<Vec<ChannelSubscription>> {
        self.subscriptions.lock().clone()
    }
}

pub fn channel_chat(buffer: usize) -> (ChannelChat, ChannelChatHandle) {
    let (tx, rx) = mpsc::channel(buffer);
    let subscriptions = SubscriptionLog::default();
    (
        ChannelChat {
            rx,
            subscriptions: Arc::clone(&subscriptions),
        },
        ChannelChatHandle { tx, subscriptions },
    )
}

#[async_trait]
impl ChatStream for ChannelChat {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&mut self, channels: &[ChannelSubscription]) -> Result<()> {
        self.subscriptions.lock().push(channels.to_vec());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<ChatEvent> {
        self.rx.recv().await.flatten()
    }

    fn source_name(&self) -> &'static str {
        "channel"
    }
}
