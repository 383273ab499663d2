//! Retry decorator for any [`ExecutionGateway`].
//!
//! Transient failures trigger a reconnect, a backoff sleep and another
//! attempt, up to the policy's attempt budget. Rejections pass through at
//! once.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::application::backoff::Backoff;
use crate::domain::id::Ticket;
use crate::error::ExecutionError;
use crate::infrastructure::config::execution::RetryConfig;
use crate::port::outbound::execution::{CloseOutcome, ExecutionGateway, Fill, OrderRequest};

/// Attempt budget and delay schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per call, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay, self.max_delay, self.multiplier)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Wraps a gateway with bounded retries.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: ExecutionGateway> RetryingGateway<G> {
    #[must_use]
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[must_use]
    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, ExecutionError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ExecutionError>> + Send,
        T: Send,
    {
        let mut backoff = self.policy.backoff();
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Terminal call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= self.policy.max_attempts => {
                    return Err(ExecutionError::RetriesExhausted {
                        operation,
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient terminal failure, retrying"
                    );
                    if let Err(e) = self.inner.reconnect().await {
                        warn!(operation, error = %e, "Terminal reconnect failed");
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<G: ExecutionGateway> ExecutionGateway for RetryingGateway<G> {
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        self.run("place_order", || self.inner.place_order(request))
            .await
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        self.run("modify_position", || {
            self.inner.modify_position(ticket, stop_loss, take_profit)
        })
        .await
    }

    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError> {
        self.run("close_position", || self.inner.close_position(ticket))
            .await
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        self.run("close_partial", || self.inner.close_partial(ticket, volume))
            .await
    }

    async fn reconnect(&self) -> Result<(), ExecutionError> {
        self.inner.reconnect().await
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        self.inner.ping().await
    }

    fn transport_name(&self) -> &'static str {
        self.inner.transport_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::order;
    use crate::testkit::gateway::{GatewayOp, RecordingGateway};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_after_reconnect() {
        let gateway = RecordingGateway::new();
        gateway.fail_on(GatewayOp::Place, 1, ExecutionError::Transient("no connection".into()));
        let retrying = RetryingGateway::new(gateway, policy(3));

        let fill = retrying.place_order(&order("XAUUSD")).await.unwrap();

        assert_eq!(retrying.inner().placed().len(), 1);
        assert_eq!(retrying.inner().reconnects(), 1);
        assert_eq!(fill.ticket, retrying.inner().placed_tickets()[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn retried_placement_keeps_its_request_id() {
        let gateway = RecordingGateway::new();
        for nth in 1..=2 {
            gateway.fail_on(GatewayOp::Place, nth, ExecutionError::Transient("timeout".into()));
        }
        let retrying = RetryingGateway::new(gateway, policy(3));
        let request = order("XAUUSD");

        retrying.place_order(&request).await.unwrap();

        let ids = retrying.inner().place_ids();
        assert_eq!(ids, vec![request.request_id; 3]);
        assert_eq!(retrying.inner().placed().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_is_not_retried() {
        let gateway = RecordingGateway::new();
        gateway.fail_on(GatewayOp::Place, 1, ExecutionError::Rejected("no money".into()));
        let retrying = RetryingGateway::new(gateway, policy(3));

        let err = retrying.place_order(&order("XAUUSD")).await.unwrap_err();

        assert_eq!(err, ExecutionError::Rejected("no money".into()));
        assert_eq!(retrying.inner().attempts(GatewayOp::Place), 1);
        assert_eq!(retrying.inner().reconnects(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempt_budget() {
        let gateway = RecordingGateway::new();
        for nth in 1..=2 {
            gateway.fail_on(GatewayOp::Close, nth, ExecutionError::Transient("timeout".into()));
        }
        let retrying = RetryingGateway::new(gateway, policy(2));

        let err = retrying.close_position(Ticket::new(1)).await.unwrap_err();

        assert!(matches!(
            err,
            ExecutionError::RetriesExhausted {
                operation: "close_position",
                attempts: 2,
                ..
            }
        ));
        assert_eq!(retrying.inner().attempts(GatewayOp::Close), 2);
    }
}
