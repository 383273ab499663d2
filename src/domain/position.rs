//! Tracked positions: the rows that tie a chat message to broker tickets.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, MessageId, Ticket};
use super::signal::{Direction, OrderKind};

/// Which leg of a signal a row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Short-target leg of a dual-target signal.
    Scalp,
    /// Long-target leg of a dual-target signal.
    Runner,
    /// The only leg of a single-target signal or a re-entry.
    Single,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalp => write!(f, "scalp"),
            Self::Runner => write!(f, "runner"),
            Self::Single => write!(f, "single"),
        }
    }
}

/// Status of a single leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    /// Placeholder waiting for stop-loss or targets. No broker order exists.
    PendingCompletion,
    Open,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingCompletion => write!(f, "pending"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One leg of a signal and the broker ticket backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub role: Role,
    /// Broker ticket, set once the order is placed.
    pub ticket: Option<Ticket>,
    /// Symbol as known to the broker.
    pub symbol: String,
    pub direction: Direction,
    #[serde(default)]
    pub order_kind: OrderKind,
    /// Requested entry, replaced by the fill price once open.
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    /// Target for this leg.
    pub take_profit: Option<Decimal>,
    /// Full target ladder from the signal.
    #[serde(default)]
    pub take_profits: Vec<Decimal>,
    /// Stop-loss as last written in the signal text. Breakeven moves and
    /// replies do not change it, so a redelivery compares against it.
    #[serde(default)]
    pub original_stop_loss: Option<Decimal>,
    /// Target ladder as last written in the signal text.
    #[serde(default)]
    pub original_take_profits: Vec<Decimal>,
    pub lot_size: Decimal,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Signal this row re-enters, if it is a re-entry.
    #[serde(default)]
    pub origin: Option<MessageId>,
    /// Target levels already reported as hit.
    #[serde(default)]
    pub targets_hit: Vec<u8>,
}

impl TrackedPosition {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == PositionStatus::PendingCompletion
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == PositionStatus::Closed
    }

    /// Mark the leg closed at `at`.
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.status = PositionStatus::Closed;
        self.closed_at = Some(at);
    }

    /// Stop-loss the signal text carried, falling back to the live one for
    /// rows saved before originals were recorded.
    #[must_use]
    pub fn signalled_stop_loss(&self) -> Option<Decimal> {
        self.original_stop_loss.or(self.stop_loss)
    }

    /// Target ladder the signal text carried, with the same fallback.
    #[must_use]
    pub fn signalled_take_profits(&self) -> &[Decimal] {
        if self.original_take_profits.is_empty() {
            &self.take_profits
        } else {
            &self.original_take_profits
        }
    }

    /// Record that target `level` fired for this leg.
    pub fn record_target(&mut self, level: u8) {
        if !self.targets_hit.contains(&level) {
            self.targets_hit.push(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg() -> TrackedPosition {
        TrackedPosition {
            message_id: MessageId::new(1),
            channel_id: ChannelId::new("c"),
            role: Role::Scalp,
            ticket: Some(Ticket::new(10)),
            symbol: "XAUUSD".into(),
            direction: Direction::Buy,
            order_kind: OrderKind::Market,
            entry_price: Some(dec!(2650)),
            stop_loss: Some(dec!(2640)),
            take_profit: Some(dec!(2660)),
            take_profits: vec![dec!(2660), dec!(2670)],
            original_stop_loss: None,
            original_take_profits: Vec::new(),
            lot_size: dec!(0.01),
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            origin: None,
            targets_hit: Vec::new(),
        }
    }

    #[test]
    fn close_sets_status_and_timestamp() {
        let mut p = leg();
        let at = Utc::now();
        p.close(at);
        assert!(p.is_closed());
        assert_eq!(p.closed_at, Some(at));
    }

    #[test]
    fn signalled_levels_survive_breakeven() {
        let mut p = leg();
        assert_eq!(p.signalled_stop_loss(), Some(dec!(2640)));

        p.original_stop_loss = Some(dec!(2640));
        p.original_take_profits = p.take_profits.clone();
        p.stop_loss = Some(dec!(2650));
        p.take_profits = vec![dec!(2680)];
        assert_eq!(p.signalled_stop_loss(), Some(dec!(2640)));
        assert_eq!(p.signalled_take_profits(), &[dec!(2660), dec!(2670)]);
    }

    #[test]
    fn record_target_is_idempotent() {
        let mut p = leg();
        p.record_target(1);
        p.record_target(1);
        assert_eq!(p.targets_hit, vec![1]);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&PositionStatus::PendingCompletion).unwrap();
        assert_eq!(json, "\"pending_completion\"");
    }
}
