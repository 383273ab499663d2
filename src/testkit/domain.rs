//! Builders for domain primitives used across tests.
//!
//! Everything defaults to a gold signal on channel `gold`: buy at 2650,
//! stop 2640, targets 2660 and 2670.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::domain::id::{ChannelId, MessageId, Ticket};
use crate::domain::message::ChatMessage;
use crate::domain::position::{PositionStatus, Role, TrackedPosition};
use crate::domain::signal::{ClassifiedSignal, Direction, MessageType, OrderKind, SignalStep};
use crate::port::outbound::execution::OrderRequest;

/// Channel used by every builder.
pub const CHANNEL: &str = "gold";

pub fn channel() -> ChannelId {
    ChannelId::new(CHANNEL)
}

/// Market buy with explicit price and levels.
pub fn order(symbol: &str) -> OrderRequest {
    OrderRequest {
        request_id: Uuid::new_v4(),
        symbol: symbol.to_string(),
        direction: Direction::Buy,
        kind: OrderKind::Market,
        volume: dec!(0.01),
        price: Some(dec!(2650)),
        stop_loss: Some(dec!(2640)),
        take_profit: Some(dec!(2660)),
        comment: "test".into(),
    }
}

fn target_for(role: Role) -> Decimal {
    match role {
        Role::Scalp | Role::Single => dec!(2660),
        Role::Runner => dec!(2670),
    }
}

/// Open XAUUSD leg for message `id` backed by `ticket`.
pub fn open_leg(id: i64, role: Role, ticket: u64) -> TrackedPosition {
    TrackedPosition {
        message_id: MessageId::new(id),
        channel_id: channel(),
        role,
        ticket: Some(Ticket::new(ticket)),
        symbol: "XAUUSD".into(),
        direction: Direction::Buy,
        order_kind: OrderKind::Market,
        entry_price: Some(dec!(2650)),
        stop_loss: Some(dec!(2640)),
        take_profit: Some(target_for(role)),
        take_profits: vec![dec!(2660), dec!(2670)],
        original_stop_loss: Some(dec!(2640)),
        original_take_profits: vec![dec!(2660), dec!(2670)],
        lot_size: dec!(0.01),
        status: PositionStatus::Open,
        opened_at: Utc::now(),
        closed_at: None,
        origin: None,
        targets_hit: Vec::new(),
    }
}

/// Placeholder row for message `id` without stop-loss or targets.
pub fn pending_leg(id: i64) -> TrackedPosition {
    TrackedPosition {
        ticket: None,
        stop_loss: None,
        take_profit: None,
        take_profits: Vec::new(),
        original_stop_loss: None,
        original_take_profits: Vec::new(),
        status: PositionStatus::PendingCompletion,
        ..open_leg(id, Role::Single, 0)
    }
}

/// Complete buy signal for XAUUSD with two targets.
pub fn complete_signal(id: i64) -> ClassifiedSignal {
    ClassifiedSignal {
        message_id: MessageId::new(id),
        channel_id: channel(),
        reply_to: None,
        message_type: MessageType::NewSignalComplete,
        symbol: Some("XAUUSD".into()),
        direction: Some(Direction::Buy),
        order_kind: OrderKind::Market,
        entry_price: Some(dec!(2650)),
        stop_loss: Some(dec!(2640)),
        take_profits: vec![dec!(2660), dec!(2670)],
        confidence: 0.95,
        tp_hit: None,
        move_sl_to_entry: false,
        lot_size: None,
        close_percentage: None,
        steps: Vec::new(),
    }
}

/// Buy signal for XAUUSD that names neither stop-loss nor targets.
pub fn incomplete_signal(id: i64) -> ClassifiedSignal {
    ClassifiedSignal {
        message_type: MessageType::NewSignalIncomplete,
        stop_loss: None,
        take_profits: Vec::new(),
        ..complete_signal(id)
    }
}

/// Follow-up of `message_type` replying to `target`.
pub fn follow_up(id: i64, target: i64, message_type: MessageType) -> ClassifiedSignal {
    ClassifiedSignal {
        message_id: MessageId::new(id),
        channel_id: channel(),
        reply_to: Some(MessageId::new(target)),
        message_type,
        symbol: None,
        direction: None,
        order_kind: OrderKind::Market,
        entry_price: None,
        stop_loss: None,
        take_profits: Vec::new(),
        confidence: 0.9,
        tp_hit: None,
        move_sl_to_entry: false,
        lot_size: None,
        close_percentage: None,
        steps: Vec::new(),
    }
}

/// Compound message made of `steps`, replying to `target`.
pub fn compound(id: i64, target: Option<i64>, steps: Vec<SignalStep>) -> ClassifiedSignal {
    ClassifiedSignal {
        reply_to: target.map(MessageId::new),
        steps,
        ..follow_up(id, 0, MessageType::CompoundAction)
    }
}

/// Bare step of `message_type`.
pub fn step(message_type: MessageType) -> SignalStep {
    SignalStep {
        message_type,
        reply_to: None,
        symbol: None,
        direction: None,
        order_kind: OrderKind::Market,
        entry_price: None,
        stop_loss: None,
        take_profits: Vec::new(),
        tp_hit: None,
        move_sl_to_entry: false,
        lot_size: None,
        close_percentage: None,
    }
}

/// Chat message `id` on the gold channel.
pub fn chat_message(id: i64, text: &str) -> ChatMessage {
    ChatMessage {
        channel: channel(),
        id: MessageId::new(id),
        reply_to: None,
        text: text.to_string(),
        edited: false,
        date: Utc::now(),
    }
}
