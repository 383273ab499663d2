//! Terminal gateway factory.

use std::sync::Arc;

use tracing::info;

use crate::adapter::outbound::execution::bridge::BridgeGateway;
use crate::adapter::outbound::execution::driver::{DriverGateway, PaperTerminal};
#[cfg(unix)]
use crate::adapter::outbound::execution::ipc::IpcGateway;
use crate::adapter::outbound::execution::retry::{RetryPolicy, RetryingGateway};
#[cfg(not(unix))]
use crate::error::ConfigError;
use crate::error::Result;
use crate::infrastructure::config::execution::{ExecutionConfig, TransportConfig};
use crate::port::outbound::execution::ExecutionGateway;

/// Build the configured transport without retries.
///
/// # Errors
///
/// Returns an error if the transport cannot be constructed.
pub fn build_transport(config: &ExecutionConfig) -> Result<Box<dyn ExecutionGateway>> {
    let gateway: Box<dyn ExecutionGateway> = match &config.transport {
        TransportConfig::Bridge(bridge) => Box::new(BridgeGateway::new(bridge)?),
        #[cfg(unix)]
        TransportConfig::Ipc(ipc) => Box::new(IpcGateway::new(ipc)),
        #[cfg(not(unix))]
        TransportConfig::Ipc(_) => {
            return Err(ConfigError::InvalidValue {
                field: "transport",
                reason: "ipc transport requires a unix platform".into(),
            }
            .into())
        }
        TransportConfig::Paper(paper) => Box::new(DriverGateway::new(PaperTerminal::new(
            paper.reference_prices.clone(),
        ))),
    };
    Ok(gateway)
}

/// Build the configured transport behind the retry decorator.
///
/// # Errors
///
/// Returns an error if the transport cannot be constructed.
pub fn build_gateway(config: &ExecutionConfig) -> Result<Arc<dyn ExecutionGateway>> {
    let transport = build_transport(config)?;
    let policy = RetryPolicy::from_config(&config.retry);
    info!(
        transport = transport.transport_name(),
        max_attempts = policy.max_attempts,
        "Execution gateway ready"
    );
    Ok(Arc::new(RetryingGateway::new(transport, policy)))
}
