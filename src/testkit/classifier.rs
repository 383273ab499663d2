//! Stub [`SignalClassifier`] keyed by message id.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::id::MessageId;
use crate::domain::message::ChatMessage;
use crate::domain::signal::ClassifiedSignal;
use crate::error::{Error, Result};
use crate::port::outbound::classifier::{Classification, SignalClassifier};

/// Returns the signal registered for a message id, `NotASignal` otherwise.
#[derive(Default)]
pub struct StubClassifier {
    signals: Mutex<HashMap<MessageId, ClassifiedSignal>>,
    failing: Mutex<Vec<MessageId>>,
    calls: Mutex<Vec<MessageId>>,
}

impl StubClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the message carrying `signal.message_id` as `signal`.
    pub fn with_signal(self, signal: ClassifiedSignal) -> Self {
        self.signals.lock().insert(signal.message_id, signal);
        self
    }

    /// Fail classification of `id`.
    pub fn failing_on(self, id: i64) -> Self {
        self.failing.lock().push(MessageId::new(id));
        self
    }

    /// Message ids classified so far.
    pub fn calls(&self) -> Vec<MessageId> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SignalClassifier for StubClassifier {
    async fn classify(&self, message: &ChatMessage) -> Result<Classification> {
        self.calls.lock().push(message.id);
        if self.failing.lock().contains(&message.id) {
            return Err(Error::Classification("classifier unavailable".into()));
        }
        Ok(self
            .signals
            .lock()
            .get(&message.id)
            .cloned()
            .map_or(Classification::NotASignal, |signal| {
                Classification::Signal(Box::new(signal))
            }))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
