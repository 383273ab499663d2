//! In-process driver transport.
//!
//! Terminal drivers are blocking libraries, so every call runs on the
//! blocking pool behind a mutex. [`PaperTerminal`] is a simulated driver
//! used for dry runs and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use super::wire::{TerminalReply, TerminalRequest, RETCODE_DONE, RETCODE_POSITION_CLOSED};
use crate::domain::id::Ticket;
use crate::error::ExecutionError;
use crate::port::outbound::execution::{CloseOutcome, ExecutionGateway, Fill, OrderRequest};

/// Invalid price.
const RETCODE_INVALID_PRICE: u32 = 10015;

/// A blocking terminal API.
pub trait TerminalDriver: Send + 'static {
    /// Execute one request and return the terminal's reply.
    fn execute(&mut self, request: &TerminalRequest) -> Result<TerminalReply, ExecutionError>;

    /// Tear down and re-initialize the terminal session.
    fn reinitialize(&mut self) -> Result<(), ExecutionError>;

    fn name(&self) -> &'static str;
}

/// [`ExecutionGateway`] over a [`TerminalDriver`].
pub struct DriverGateway<D> {
    driver: Arc<Mutex<D>>,
    name: &'static str,
}

impl<D: TerminalDriver> DriverGateway<D> {
    #[must_use]
    pub fn new(driver: D) -> Self {
        let name = driver.name();
        Self {
            driver: Arc::new(Mutex::new(driver)),
            name,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ExecutionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut D) -> Result<T, ExecutionError> + Send + 'static,
    {
        let driver = Arc::clone(&self.driver);
        tokio::task::spawn_blocking(move || f(&mut *driver.lock()))
            .await
            .map_err(|e| ExecutionError::Transient(format!("driver task failed: {e}")))?
    }

    async fn call(&self, request: TerminalRequest) -> Result<TerminalReply, ExecutionError> {
        debug!(op = request.op(), id = %request.id(), driver = self.name, "Driver request");
        self.blocking(move |driver| driver.execute(&request)).await
    }
}

#[async_trait]
impl<D: TerminalDriver> ExecutionGateway for DriverGateway<D> {
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        self.call(TerminalRequest::place(request))
            .await?
            .into_fill(request)
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        self.call(TerminalRequest::modify(ticket, stop_loss, take_profit))
            .await?
            .check()
    }

    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError> {
        self.call(TerminalRequest::close(ticket)).await?.into_close()
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        self.call(TerminalRequest::close_partial(ticket, volume))
            .await?
            .into_close()
    }

    async fn reconnect(&self) -> Result<(), ExecutionError> {
        self.blocking(|driver: &mut D| driver.reinitialize()).await
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        self.call(TerminalRequest::ping()).await?.check()
    }

    fn transport_name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    symbol: String,
    volume: Decimal,
    sl: Option<Decimal>,
    tp: Option<Decimal>,
}

/// Simulated terminal: fills everything at the requested or reference price.
#[derive(Debug)]
pub struct PaperTerminal {
    next_ticket: u64,
    reference_prices: BTreeMap<String, Decimal>,
    positions: HashMap<Ticket, PaperPosition>,
    /// Placement replies by request id, replayed for retried requests.
    executed: HashMap<Uuid, TerminalReply>,
}

impl PaperTerminal {
    #[must_use]
    pub fn new(reference_prices: BTreeMap<String, Decimal>) -> Self {
        Self {
            next_ticket: 1,
            reference_prices,
            positions: HashMap::new(),
            executed: HashMap::new(),
        }
    }

    fn done() -> TerminalReply {
        TerminalReply {
            ok: true,
            retcode: Some(RETCODE_DONE),
            ..TerminalReply::default()
        }
    }

    fn failed(retcode: u32, comment: &str) -> TerminalReply {
        TerminalReply {
            ok: false,
            retcode: Some(retcode),
            comment: Some(comment.to_string()),
            ..TerminalReply::default()
        }
    }
}

impl TerminalDriver for PaperTerminal {
    fn execute(&mut self, request: &TerminalRequest) -> Result<TerminalReply, ExecutionError> {
        if let TerminalRequest::Place { id, .. } = request {
            if let Some(reply) = self.executed.get(id) {
                debug!(%id, "Paper placement already executed, replaying reply");
                return Ok(reply.clone());
            }
        }
        let reply = match request {
            TerminalRequest::Place {
                id,
                symbol,
                volume,
                price,
                sl,
                tp,
                ..
            } => {
                let Some(fill_price) = price.or_else(|| self.reference_prices.get(symbol).copied())
                else {
                    return Ok(Self::failed(RETCODE_INVALID_PRICE, "no price for symbol"));
                };
                let ticket = Ticket::new(self.next_ticket);
                self.next_ticket += 1;
                self.positions.insert(
                    ticket,
                    PaperPosition {
                        symbol: symbol.clone(),
                        volume: *volume,
                        sl: *sl,
                        tp: *tp,
                    },
                );
                let reply = TerminalReply {
                    ticket: Some(ticket),
                    price: Some(fill_price),
                    volume: Some(*volume),
                    ..Self::done()
                };
                self.executed.insert(*id, reply.clone());
                reply
            }
            TerminalRequest::Modify { ticket, sl, tp, .. } => match self.positions.get_mut(ticket) {
                Some(position) => {
                    position.sl = *sl;
                    position.tp = *tp;
                    debug!(
                        %ticket,
                        symbol = %position.symbol,
                        sl = ?position.sl,
                        tp = ?position.tp,
                        "Paper position modified"
                    );
                    Self::done()
                }
                None => Self::failed(RETCODE_POSITION_CLOSED, "position not found"),
            },
            TerminalRequest::Close { ticket, .. } => match self.positions.remove(ticket) {
                Some(_) => Self::done(),
                None => Self::failed(RETCODE_POSITION_CLOSED, "position not found"),
            },
            TerminalRequest::ClosePartial { ticket, volume, .. } => {
                match self.positions.get_mut(ticket) {
                    Some(position) if position.volume > *volume => {
                        position.volume -= *volume;
                        TerminalReply {
                            volume: Some(position.volume),
                            ..Self::done()
                        }
                    }
                    Some(_) => {
                        self.positions.remove(ticket);
                        Self::done()
                    }
                    None => Self::failed(RETCODE_POSITION_CLOSED, "position not found"),
                }
            }
            TerminalRequest::Ping { .. } => Self::done(),
        };
        Ok(reply)
    }

    fn reinitialize(&mut self) -> Result<(), ExecutionError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::order;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn paper_fills_modifies_and_closes() {
        let gateway = DriverGateway::new(PaperTerminal::new(BTreeMap::new()));
        let fill = gateway.place_order(&order("XAUUSD")).await.unwrap();
        assert_eq!(fill.price, dec!(2650));

        gateway
            .modify_position(fill.ticket, Some(dec!(2650)), Some(dec!(2670)))
            .await
            .unwrap();
        assert_eq!(
            gateway.close_position(fill.ticket).await.unwrap(),
            CloseOutcome::Closed
        );
        assert_eq!(
            gateway.close_position(fill.ticket).await.unwrap(),
            CloseOutcome::AlreadyClosed
        );
    }

    #[tokio::test]
    async fn retried_placement_returns_the_first_ticket() {
        let gateway = DriverGateway::new(PaperTerminal::new(BTreeMap::new()));
        let request = order("XAUUSD");

        let first = gateway.place_order(&request).await.unwrap();
        let second = gateway.place_order(&request).await.unwrap();
        assert_eq!(first, second);

        let other = gateway.place_order(&order("XAUUSD")).await.unwrap();
        assert_ne!(other.ticket, first.ticket);
    }

    #[tokio::test]
    async fn partial_close_keeps_the_remainder_open() {
        let gateway = DriverGateway::new(PaperTerminal::new(BTreeMap::new()));
        let mut request = order("XAUUSD");
        request.volume = dec!(0.10);
        let fill = gateway.place_order(&request).await.unwrap();

        assert_eq!(
            gateway.close_partial(fill.ticket, dec!(0.07)).await.unwrap(),
            CloseOutcome::Closed
        );
        gateway
            .modify_position(fill.ticket, Some(dec!(2650)), None)
            .await
            .unwrap();
        assert_eq!(
            gateway.close_partial(fill.ticket, dec!(0.03)).await.unwrap(),
            CloseOutcome::Closed
        );
        assert_eq!(
            gateway.close_position(fill.ticket).await.unwrap(),
            CloseOutcome::AlreadyClosed
        );
    }

    #[tokio::test]
    async fn market_order_uses_reference_price() {
        let prices = BTreeMap::from([("EURUSD".to_string(), dec!(1.0850))]);
        let gateway = DriverGateway::new(PaperTerminal::new(prices));
        let mut request = order("EURUSD");
        request.price = None;

        let fill = gateway.place_order(&request).await.unwrap();
        assert_eq!(fill.price, dec!(1.0850));
    }

    #[tokio::test]
    async fn missing_price_is_rejected() {
        let gateway = DriverGateway::new(PaperTerminal::new(BTreeMap::new()));
        let mut request = order("EURUSD");
        request.price = None;

        let err = gateway.place_order(&request).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(gateway.transport_name(), "paper");
    }
}
