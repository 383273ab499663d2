//! Terminal wire format shared by the bridge and IPC transports.
//!
//! Requests are JSON objects tagged by `op`; every reply carries `ok` plus
//! whatever the operation produced. Prices and volumes travel as decimal
//! strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::id::Ticket;
use crate::domain::signal::{Direction, OrderKind};
use crate::error::ExecutionError;
use crate::port::outbound::execution::{CloseOutcome, Fill, OrderRequest};

/// Request accepted.
pub const RETCODE_DONE: u32 = 10009;
/// Pending order placed.
pub const RETCODE_PLACED: u32 = 10008;
/// Position no longer exists.
pub const RETCODE_POSITION_CLOSED: u32 = 10036;

/// Connectivity and quoting hiccups worth another try.
const TRANSIENT_RETCODES: &[u32] = &[
    10004, // requote
    10012, // request timed out
    10020, // prices changed
    10021, // no quotes
    10024, // too many requests
    10031, // no connection
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TerminalRequest {
    Place {
        id: Uuid,
        symbol: String,
        side: Direction,
        kind: OrderKind,
        volume: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        price: Option<Decimal>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sl: Option<Decimal>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tp: Option<Decimal>,
        comment: String,
    },
    Modify {
        id: Uuid,
        ticket: Ticket,
        sl: Option<Decimal>,
        tp: Option<Decimal>,
    },
    Close {
        id: Uuid,
        ticket: Ticket,
    },
    ClosePartial {
        id: Uuid,
        ticket: Ticket,
        volume: Decimal,
    },
    Ping {
        id: Uuid,
    },
}

impl TerminalRequest {
    /// Placement keyed by the order's idempotency key, so the terminal can
    /// recognise a retried request it already executed.
    #[must_use]
    pub fn place(order: &OrderRequest) -> Self {
        Self::Place {
            id: order.request_id,
            symbol: order.symbol.clone(),
            side: order.direction,
            kind: order.kind,
            volume: order.volume,
            price: order.price,
            sl: order.stop_loss,
            tp: order.take_profit,
            comment: order.comment.clone(),
        }
    }

    #[must_use]
    pub fn modify(ticket: Ticket, sl: Option<Decimal>, tp: Option<Decimal>) -> Self {
        Self::Modify {
            id: Uuid::new_v4(),
            ticket,
            sl,
            tp,
        }
    }

    #[must_use]
    pub fn close(ticket: Ticket) -> Self {
        Self::Close {
            id: Uuid::new_v4(),
            ticket,
        }
    }

    #[must_use]
    pub fn close_partial(ticket: Ticket, volume: Decimal) -> Self {
        Self::ClosePartial {
            id: Uuid::new_v4(),
            ticket,
            volume,
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        Self::Ping { id: Uuid::new_v4() }
    }

    /// Operation name for logs.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Place { .. } => "place",
            Self::Modify { .. } => "modify",
            Self::Close { .. } => "close",
            Self::ClosePartial { .. } => "close_partial",
            Self::Ping { .. } => "ping",
        }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        match self {
            Self::Place { id, .. }
            | Self::Modify { id, .. }
            | Self::Close { id, .. }
            | Self::ClosePartial { id, .. }
            | Self::Ping { id } => *id,
        }
    }
}

/// Terminal reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retcode: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TerminalReply {
    /// Interpret a placement reply.
    pub fn into_fill(self, order: &OrderRequest) -> Result<Fill, ExecutionError> {
        self.check()?;
        let ticket = self
            .ticket
            .ok_or_else(|| ExecutionError::Rejected("reply without ticket".into()))?;
        Ok(Fill {
            ticket,
            price: self.price.or(order.price).unwrap_or_default(),
            volume: self.volume.unwrap_or(order.volume),
        })
    }

    /// Interpret a close reply; a vanished position counts as closed.
    pub fn into_close(self) -> Result<CloseOutcome, ExecutionError> {
        if !self.ok && self.retcode == Some(RETCODE_POSITION_CLOSED) {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        self.check().map(|()| CloseOutcome::Closed)
    }

    /// Success or the typed failure the reply describes.
    pub fn check(&self) -> Result<(), ExecutionError> {
        if self.ok {
            return Ok(());
        }
        let comment = self.comment.clone().unwrap_or_default();
        Err(match self.retcode {
            Some(code) => classify_retcode(code, &comment),
            None => ExecutionError::Rejected(if comment.is_empty() {
                "terminal refused the request".into()
            } else {
                comment
            }),
        })
    }
}

/// Map a terminal return code to a failure kind.
#[must_use]
pub fn classify_retcode(code: u32, comment: &str) -> ExecutionError {
    let detail = if comment.is_empty() {
        format!("retcode {code}")
    } else {
        format!("retcode {code}: {comment}")
    };
    if TRANSIENT_RETCODES.contains(&code) {
        ExecutionError::Transient(detail)
    } else {
        ExecutionError::Rejected(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> OrderRequest {
        OrderRequest {
            request_id: Uuid::new_v4(),
            symbol: "XAUUSD".into(),
            direction: Direction::Buy,
            kind: OrderKind::Market,
            volume: dec!(0.01),
            price: Some(dec!(2650)),
            stop_loss: Some(dec!(2640)),
            take_profit: Some(dec!(2660)),
            comment: "sr:501:scalp".into(),
        }
    }

    #[test]
    fn place_request_is_tagged_by_op() {
        let json = serde_json::to_value(TerminalRequest::place(&order())).unwrap();
        assert_eq!(json["op"], "place");
        assert_eq!(json["symbol"], "XAUUSD");
        assert_eq!(json["side"], "buy");
        assert_eq!(json["kind"], "market");
        assert_eq!(json["sl"], "2640");
    }

    #[test]
    fn place_request_reuses_the_order_key() {
        let order = order();
        let first = TerminalRequest::place(&order);
        let second = TerminalRequest::place(&order);
        assert_eq!(first.id(), order.request_id);
        assert_eq!(second.id(), first.id());
    }

    #[test]
    fn partial_close_carries_volume() {
        let request = TerminalRequest::close_partial(Ticket::new(7), dec!(0.07));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["op"], "close_partial");
        assert_eq!(json["ticket"], 7);
        assert_eq!(json["volume"], "0.07");
        assert_eq!(request.op(), "close_partial");
    }

    #[test]
    fn reply_without_price_falls_back_to_request() {
        let reply: TerminalReply = serde_json::from_str(r#"{"ok":true,"ticket":42}"#).unwrap();
        let fill = reply.into_fill(&order()).unwrap();
        assert_eq!(fill.ticket, Ticket::new(42));
        assert_eq!(fill.price, dec!(2650));
        assert_eq!(fill.volume, dec!(0.01));
    }

    #[test]
    fn retcodes_split_into_transient_and_rejected() {
        assert!(classify_retcode(10031, "no connection").is_transient());
        assert!(classify_retcode(10004, "").is_transient());
        assert!(!classify_retcode(10019, "no money").is_transient());
    }

    #[test]
    fn closed_position_is_not_an_error_on_close() {
        let reply = TerminalReply {
            ok: false,
            retcode: Some(RETCODE_POSITION_CLOSED),
            ..TerminalReply::default()
        };
        assert_eq!(reply.into_close(), Ok(CloseOutcome::AlreadyClosed));
    }

    #[test]
    fn failed_reply_without_retcode_is_rejected() {
        let reply = TerminalReply {
            ok: false,
            comment: Some("market closed".into()),
            ..TerminalReply::default()
        };
        assert_eq!(
            reply.check(),
            Err(ExecutionError::Rejected("market closed".into()))
        );
    }
}
