//! Broker terminal port.
//!
//! Every transport (network bridge, local IPC, in-process driver) implements
//! [`ExecutionGateway`]. Failures are typed so the retry decorator can tell a
//! dropped connection from a broker refusal.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::id::Ticket;
use crate::domain::signal::{Direction, OrderKind};
use crate::error::ExecutionError;

/// An order to place at the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Idempotency key, fixed when the order is drafted. Every retry of the
    /// same placement carries the same id.
    pub request_id: Uuid,
    /// Broker symbol.
    pub symbol: String,
    pub direction: Direction,
    pub kind: OrderKind,
    pub volume: Decimal,
    /// Limit/stop price. Ignored for market orders.
    pub price: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    /// Free-form tag stored on the broker side.
    pub comment: String,
}

/// A successful placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub ticket: Ticket,
    pub price: Decimal,
    pub volume: Decimal,
}

/// Result of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// The ticket was already gone (hit its own target or stop).
    AlreadyClosed,
}

/// Trait for placing and managing broker positions.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Place an order and return the resulting ticket.
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError>;

    /// Replace stop-loss and take-profit of an open ticket.
    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError>;

    /// Close an open ticket at market.
    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError>;

    /// Close `volume` lots of an open ticket at market, leaving the rest open.
    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError>;

    /// Drop and re-establish the terminal session.
    async fn reconnect(&self) -> Result<(), ExecutionError>;

    /// Cheap liveness check.
    async fn ping(&self) -> Result<(), ExecutionError>;

    /// Transport name for logging.
    fn transport_name(&self) -> &'static str;
}

#[async_trait]
impl ExecutionGateway for Box<dyn ExecutionGateway> {
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        (**self).place_order(request).await
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        (**self).modify_position(ticket, stop_loss, take_profit).await
    }

    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError> {
        (**self).close_position(ticket).await
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        (**self).close_partial(ticket, volume).await
    }

    async fn reconnect(&self) -> Result<(), ExecutionError> {
        (**self).reconnect().await
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        (**self).ping().await
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
