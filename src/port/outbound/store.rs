//! Persistence port for the bot state.

use crate::domain::state::BotState;
use crate::error::Result;

/// Durable storage for [`BotState`].
///
/// `save` must be atomic: after a crash the stored document is either the
/// previous one or the new one.
pub trait StateRepository: Send + Sync {
    /// Load the stored state, `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<BotState>>;

    /// Replace the stored state.
    fn save(&self, state: &BotState) -> Result<()>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}
