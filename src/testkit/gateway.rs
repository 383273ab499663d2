//! Recording [`ExecutionGateway`] with scripted failures.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::id::Ticket;
use crate::error::ExecutionError;
use crate::port::outbound::execution::{CloseOutcome, ExecutionGateway, Fill, OrderRequest};

/// Gateway operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Place,
    Modify,
    Close,
    PartialClose,
}

#[derive(Default)]
struct Inner {
    next_ticket: u64,
    placed: Vec<(OrderRequest, Ticket)>,
    modified: Vec<(Ticket, Option<Decimal>, Option<Decimal>)>,
    closed: Vec<Ticket>,
    partials: Vec<(Ticket, Decimal)>,
    open: BTreeSet<Ticket>,
    /// Request id of every placement attempt, failed ones included.
    place_ids: Vec<Uuid>,
    delays: HashMap<GatewayOp, Duration>,
    attempts: HashMap<GatewayOp, u32>,
    failures: HashMap<(GatewayOp, u32), ExecutionError>,
    reconnects: u32,
    pings: u32,
    ping_error: Option<ExecutionError>,
}

impl Inner {
    /// Count an attempt and return the scripted failure for it, if any.
    fn attempt(&mut self, op: GatewayOp) -> Result<(), ExecutionError> {
        let count = self.attempts.entry(op).or_insert(0);
        *count += 1;
        match self.failures.remove(&(op, *count)) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Fills every order at its requested price (or 1) with tickets from 1.
///
/// Closing a ticket that is not open reports
/// [`CloseOutcome::AlreadyClosed`].
#[derive(Default)]
pub struct RecordingGateway {
    inner: Mutex<Inner>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `nth` attempt (1-based) of `op` with `err`.
    pub fn fail_on(&self, op: GatewayOp, nth: u32, err: ExecutionError) {
        self.inner.lock().failures.insert((op, nth), err);
    }

    /// Hold every `op` call for `delay` before it reaches the broker.
    pub fn delay_on(&self, op: GatewayOp, delay: Duration) {
        self.inner.lock().delays.insert(op, delay);
    }

    async fn pause(&self, op: GatewayOp) {
        let delay = self.inner.lock().delays.get(&op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    /// Make every ping fail with `err`, or succeed again with `None`.
    pub fn set_ping_error(&self, err: Option<ExecutionError>) {
        self.inner.lock().ping_error = err;
    }

    /// Simulate the broker closing `ticket` on its own.
    pub fn close_at_broker(&self, ticket: Ticket) {
        self.inner.lock().open.remove(&ticket);
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.inner
            .lock()
            .placed
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    pub fn placed_tickets(&self) -> Vec<Ticket> {
        self.inner
            .lock()
            .placed
            .iter()
            .map(|(_, ticket)| *ticket)
            .collect()
    }

    /// Request ids seen by placement attempts, in order.
    pub fn place_ids(&self) -> Vec<Uuid> {
        self.inner.lock().place_ids.clone()
    }

    pub fn modified(&self) -> Vec<(Ticket, Option<Decimal>, Option<Decimal>)> {
        self.inner.lock().modified.clone()
    }

    /// Tickets closed by request, in order.
    pub fn closed(&self) -> Vec<Ticket> {
        self.inner.lock().closed.clone()
    }

    /// Partial closes by request, in order.
    pub fn partials(&self) -> Vec<(Ticket, Decimal)> {
        self.inner.lock().partials.clone()
    }

    /// Tickets still open at the broker.
    pub fn open_tickets(&self) -> Vec<Ticket> {
        self.inner.lock().open.iter().copied().collect()
    }

    pub fn reconnects(&self) -> u32 {
        self.inner.lock().reconnects
    }

    pub fn pings(&self) -> u32 {
        self.inner.lock().pings
    }

    /// Attempts made for `op`, failed ones included.
    pub fn attempts(&self, op: GatewayOp) -> u32 {
        self.inner.lock().attempts.get(&op).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ExecutionGateway for RecordingGateway {
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        self.pause(GatewayOp::Place).await;
        let mut inner = self.inner.lock();
        inner.place_ids.push(request.request_id);
        inner.attempt(GatewayOp::Place)?;
        inner.next_ticket += 1;
        let ticket = Ticket::new(inner.next_ticket);
        inner.placed.push((request.clone(), ticket));
        inner.open.insert(ticket);
        Ok(Fill {
            ticket,
            price: request.price.unwrap_or(Decimal::ONE),
            volume: request.volume,
        })
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        self.pause(GatewayOp::Modify).await;
        let mut inner = self.inner.lock();
        inner.attempt(GatewayOp::Modify)?;
        inner.modified.push((ticket, stop_loss, take_profit));
        Ok(())
    }

    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError> {
        self.pause(GatewayOp::Close).await;
        let mut inner = self.inner.lock();
        inner.attempt(GatewayOp::Close)?;
        if inner.open.remove(&ticket) {
            inner.closed.push(ticket);
            Ok(CloseOutcome::Closed)
        } else {
            Ok(CloseOutcome::AlreadyClosed)
        }
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        self.pause(GatewayOp::PartialClose).await;
        let mut inner = self.inner.lock();
        inner.attempt(GatewayOp::PartialClose)?;
        if inner.open.contains(&ticket) {
            inner.partials.push((ticket, volume));
            Ok(CloseOutcome::Closed)
        } else {
            Ok(CloseOutcome::AlreadyClosed)
        }
    }

    async fn reconnect(&self) -> Result<(), ExecutionError> {
        self.inner.lock().reconnects += 1;
        Ok(())
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        let mut inner = self.inner.lock();
        inner.pings += 1;
        match &inner.ping_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}
