//! Classified trade signals.
//!
//! A [`ClassifiedSignal`] is what the classifier hands to the router: the
//! typed reading of one chat message. It never contains free text.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ChannelId, MessageId};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "BUY", alias = "Buy")]
    Buy,
    #[serde(alias = "SELL", alias = "Sell")]
    Sell,
}

impl Direction {
    /// True when `stop_loss` is on the protective side of `entry`.
    #[must_use]
    pub fn stop_is_protective(self, entry: Decimal, stop_loss: Decimal) -> bool {
        match self {
            Self::Buy => stop_loss < entry,
            Self::Sell => stop_loss > entry,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// How the order is placed at the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    #[default]
    #[serde(alias = "MARKET")]
    Market,
    #[serde(alias = "LIMIT")]
    Limit,
    #[serde(alias = "STOP")]
    Stop,
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// What the classifier decided a message means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[serde(alias = "NEW_COMPLETE")]
    NewSignalComplete,
    #[serde(alias = "NEW_INCOMPLETE")]
    NewSignalIncomplete,
    Modification,
    #[serde(alias = "REENTRY")]
    ReEntry,
    #[serde(alias = "PROFIT")]
    ProfitNotification,
    #[serde(alias = "CLOSE")]
    CloseSignal,
    /// Close a percentage of every open leg.
    #[serde(alias = "PARTIAL")]
    PartialClose,
    #[serde(alias = "COMPOUND")]
    CompoundAction,
}

impl MessageType {
    /// New-signal types, which open positions keyed by their own message.
    #[must_use]
    pub const fn is_entry(self) -> bool {
        matches!(self, Self::NewSignalComplete | Self::NewSignalIncomplete)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewSignalComplete => "NEW_SIGNAL_COMPLETE",
            Self::NewSignalIncomplete => "NEW_SIGNAL_INCOMPLETE",
            Self::Modification => "MODIFICATION",
            Self::ReEntry => "RE_ENTRY",
            Self::ProfitNotification => "PROFIT_NOTIFICATION",
            Self::CloseSignal => "CLOSE_SIGNAL",
            Self::PartialClose => "PARTIAL_CLOSE",
            Self::CompoundAction => "COMPOUND_ACTION",
        };
        f.write_str(name)
    }
}

/// Typed reading of one chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedSignal {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    /// Message this one replies to, if any.
    pub reply_to: Option<MessageId>,
    pub message_type: MessageType,
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
    pub order_kind: OrderKind,
    pub entry_price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    /// Take-profit ladder, nearest first.
    pub take_profits: Vec<Decimal>,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Which target level fired (profit notifications).
    pub tp_hit: Option<u8>,
    /// Explicit instruction to move the stop-loss to entry.
    pub move_sl_to_entry: bool,
    /// Volume requested by the message, if it names one.
    pub lot_size: Option<Decimal>,
    /// Share of each open leg to close, in percent (partial closes).
    pub close_percentage: Option<u8>,
    /// Constituent actions of a compound message.
    pub steps: Vec<SignalStep>,
}

impl ClassifiedSignal {
    /// Whether the signal carries both a stop-loss and at least one target.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stop_loss.is_some() && !self.take_profits.is_empty()
    }

    /// Symbol and direction, which every new position needs.
    pub fn instrument(&self) -> Result<(&str, Direction), DomainError> {
        let symbol = self
            .symbol
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(DomainError::MissingField {
                message_id: self.message_id,
                field: "symbol",
            })?;
        let direction = self.direction.ok_or(DomainError::MissingField {
            message_id: self.message_id,
            field: "direction",
        })?;
        Ok((symbol, direction))
    }

    /// Reject a stop-loss that would not protect the position.
    pub fn check_stop_side(&self) -> Result<(), DomainError> {
        if let (Some(direction), Some(entry), Some(stop_loss)) =
            (self.direction, self.entry_price, self.stop_loss)
        {
            if !direction.stop_is_protective(entry, stop_loss) {
                return Err(DomainError::StopOnWrongSide {
                    direction,
                    entry,
                    stop_loss,
                });
            }
        }
        Ok(())
    }
}

/// One action inside a compound message.
///
/// Steps inherit the message and channel of their parent, so they only carry
/// the trading fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStep {
    pub message_type: MessageType,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub order_kind: OrderKind,
    #[serde(default)]
    pub entry_price: Option<Decimal>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profits: Vec<Decimal>,
    #[serde(default)]
    pub tp_hit: Option<u8>,
    #[serde(default)]
    pub move_sl_to_entry: bool,
    #[serde(default)]
    pub lot_size: Option<Decimal>,
    #[serde(default)]
    pub close_percentage: Option<u8>,
}

impl SignalStep {
    /// Expand into a full signal attributed to `parent`.
    #[must_use]
    pub fn into_signal(self, parent: &ClassifiedSignal) -> ClassifiedSignal {
        ClassifiedSignal {
            message_id: parent.message_id,
            channel_id: parent.channel_id.clone(),
            reply_to: self.reply_to.or(parent.reply_to),
            message_type: self.message_type,
            symbol: self.symbol,
            direction: self.direction,
            order_kind: self.order_kind,
            entry_price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profits: self.take_profits,
            confidence: parent.confidence,
            tp_hit: self.tp_hit,
            move_sl_to_entry: self.move_sl_to_entry,
            lot_size: self.lot_size,
            close_percentage: self.close_percentage,
            steps: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal() -> ClassifiedSignal {
        ClassifiedSignal {
            message_id: MessageId::new(501),
            channel_id: ChannelId::new("gold"),
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

    #[test]
    fn message_type_accepts_long_and_short_names() {
        let long: MessageType = serde_json::from_str("\"NEW_SIGNAL_COMPLETE\"").unwrap();
        let short: MessageType = serde_json::from_str("\"NEW_COMPLETE\"").unwrap();
        assert_eq!(long, short);
        let reentry: MessageType = serde_json::from_str("\"RE_ENTRY\"").unwrap();
        assert_eq!(reentry, MessageType::ReEntry);
        assert_eq!(MessageType::CloseSignal.to_string(), "CLOSE_SIGNAL");
        let partial: MessageType = serde_json::from_str("\"PARTIAL_CLOSE\"").unwrap();
        assert_eq!(partial, MessageType::PartialClose);
        assert_eq!(partial.to_string(), "PARTIAL_CLOSE");
    }

    #[test]
    fn direction_accepts_uppercase() {
        let d: Direction = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(d, Direction::Sell);
    }

    #[test]
    fn completeness_requires_stop_and_target() {
        let mut s = signal();
        assert!(s.is_complete());
        s.take_profits.clear();
        assert!(!s.is_complete());
        s.take_profits.push(dec!(2660));
        s.stop_loss = None;
        assert!(!s.is_complete());
    }

    #[test]
    fn instrument_reports_missing_symbol() {
        let mut s = signal();
        s.symbol = Some("  ".into());
        assert_eq!(
            s.instrument(),
            Err(DomainError::MissingField {
                message_id: MessageId::new(501),
                field: "symbol"
            })
        );
    }

    #[test]
    fn stop_side_is_checked_against_direction() {
        let mut s = signal();
        assert!(s.check_stop_side().is_ok());
        s.stop_loss = Some(dec!(2655));
        assert!(matches!(
            s.check_stop_side(),
            Err(DomainError::StopOnWrongSide { .. })
        ));
        s.direction = Some(Direction::Sell);
        assert!(s.check_stop_side().is_ok());
    }

    #[test]
    fn step_inherits_parent_identity() {
        let parent = signal();
        let step = SignalStep {
            message_type: MessageType::Modification,
            reply_to: None,
            symbol: None,
            direction: None,
            order_kind: OrderKind::Market,
            entry_price: None,
            stop_loss: Some(dec!(2645)),
            take_profits: Vec::new(),
            tp_hit: None,
            move_sl_to_entry: false,
            lot_size: None,
            close_percentage: Some(50),
        };
        let expanded = step.into_signal(&parent);
        assert_eq!(expanded.message_id, parent.message_id);
        assert_eq!(expanded.channel_id, parent.channel_id);
        assert_eq!(expanded.confidence, parent.confidence);
        assert_eq!(expanded.stop_loss, Some(dec!(2645)));
        assert_eq!(expanded.close_percentage, Some(50));
    }
}
