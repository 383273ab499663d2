//! Classifier port: chat text in, typed signal out.

use async_trait::async_trait;

use crate::domain::message::ChatMessage;
use crate::domain::signal::ClassifiedSignal;
use crate::error::Result;

/// What the classifier made of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Signal(Box<ClassifiedSignal>),
    NotASignal,
}

/// Turns chat messages into signals.
///
/// Callers treat an error exactly like [`Classification::NotASignal`].
#[async_trait]
pub trait SignalClassifier: Send + Sync {
    async fn classify(&self, message: &ChatMessage) -> Result<Classification>;

    fn name(&self) -> &'static str;
}
