//! Health-reporting wrapper for [`ExecutionGateway`].
//!
//! A call that ends in [`ExecutionError::RetriesExhausted`] marks the
//! execution component degraded. The next broker call that succeeds clears
//! it again, so the operator sees a terminal outage between health checks.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::application::coordinator::EXECUTION_COMPONENT;
use crate::application::status::RuntimeStatus;
use crate::domain::id::Ticket;
use crate::error::ExecutionError;
use crate::port::outbound::execution::{CloseOutcome, ExecutionGateway, Fill, OrderRequest};

pub struct HealthReportingGateway {
    inner: Arc<dyn ExecutionGateway>,
    status: Arc<RuntimeStatus>,
}

impl HealthReportingGateway {
    #[must_use]
    pub fn new(inner: Arc<dyn ExecutionGateway>, status: Arc<RuntimeStatus>) -> Self {
        Self { inner, status }
    }

    fn report<T>(&self, result: Result<T, ExecutionError>) -> Result<T, ExecutionError> {
        match &result {
            Ok(_) => {
                if self.status.is_degraded(EXECUTION_COMPONENT) {
                    self.status.mark_recovered(EXECUTION_COMPONENT);
                }
            }
            Err(ExecutionError::RetriesExhausted { .. }) => {
                self.status.mark_degraded(EXECUTION_COMPONENT);
            }
            Err(_) => {}
        }
        result
    }
}

#[async_trait]
impl ExecutionGateway for HealthReportingGateway {
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        self.report(self.inner.place_order(request).await)
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        self.report(
            self.inner
                .modify_position(ticket, stop_loss, take_profit)
                .await,
        )
    }

    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError> {
        self.report(self.inner.close_position(ticket).await)
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        self.report(self.inner.close_partial(ticket, volume).await)
    }

    async fn reconnect(&self) -> Result<(), ExecutionError> {
        self.inner.reconnect().await
    }

    // Liveness is reported by the coordinator's health check.
    async fn ping(&self) -> Result<(), ExecutionError> {
        self.inner.ping().await
    }

    fn transport_name(&self) -> &'static str {
        self.inner.transport_name()
    }
}
