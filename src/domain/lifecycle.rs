//! Per-message lifecycle and the actions that move it.

use std::fmt;

use serde::Serialize;

/// Aggregate state of one message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No rows and never discarded.
    Unseen,
    /// Placeholder rows waiting for completion.
    PendingCompletion,
    /// At least one leg is open.
    Open,
    /// Every leg is closed.
    Closed,
    /// Placeholder expired or was cancelled. Terminal.
    Discarded,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unseen => "unseen",
            Self::PendingCompletion => "pending_completion",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

/// Broker-facing action attempted by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Open,
    Modify,
    TakeProfit,
    Breakeven,
    Close,
    PartialClose,
    ReEntry,
    Expire,
    Persist,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Modify => "modify",
            Self::TakeProfit => "take_profit",
            Self::Breakeven => "breakeven",
            Self::Close => "close",
            Self::PartialClose => "partial_close",
            Self::ReEntry => "re_entry",
            Self::Expire => "expire",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}
