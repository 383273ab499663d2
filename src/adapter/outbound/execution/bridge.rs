//! Network bridge transport: JSON over HTTP to a process sitting next to the
//! terminal.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use tracing::debug;
use url::Url;

use super::wire::{TerminalReply, TerminalRequest};
use crate::domain::id::Ticket;
use crate::error::{ConfigError, ExecutionError, Result};
use crate::infrastructure::config::execution::BridgeConfig;
use crate::port::outbound::execution::{CloseOutcome, ExecutionGateway, Fill, OrderRequest};

/// Path of the RPC endpoint on the bridge.
const RPC_PATH: &str = "rpc";

/// [`ExecutionGateway`] speaking to an HTTP bridge.
#[derive(Debug, Clone)]
pub struct BridgeGateway {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl BridgeGateway {
    /// Build the client for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// built.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let mut base = Url::parse(&config.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(RPC_PATH)?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ConfigError::Other(format!("cannot build bridge client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            token: config.token.clone(),
        })
    }

    async fn call(&self, request: &TerminalRequest) -> std::result::Result<TerminalReply, ExecutionError> {
        debug!(op = request.op(), id = %request.id(), "Bridge request");
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header("x-request-id", request.id().to_string())
            .json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ExecutionError::Transient(format!("bridge unreachable: {e}")))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExecutionError::Transient(format!("bridge returned {status}")));
        }
        if !status.is_success() {
            return Err(ExecutionError::Rejected(format!("bridge returned {status}")));
        }

        // A reply we cannot read may still describe an executed order.
        response
            .json::<TerminalReply>()
            .await
            .map_err(|e| ExecutionError::Rejected(format!("unreadable bridge reply: {e}")))
    }
}

#[async_trait]
impl ExecutionGateway for BridgeGateway {
    async fn place_order(&self, request: &OrderRequest) -> std::result::Result<Fill, ExecutionError> {
        self.call(&TerminalRequest::place(request))
            .await?
            .into_fill(request)
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> std::result::Result<(), ExecutionError> {
        self.call(&TerminalRequest::modify(ticket, stop_loss, take_profit))
            .await?
            .check()
    }

    async fn close_position(&self, ticket: Ticket) -> std::result::Result<CloseOutcome, ExecutionError> {
        self.call(&TerminalRequest::close(ticket))
            .await?
            .into_close()
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> std::result::Result<CloseOutcome, ExecutionError> {
        self.call(&TerminalRequest::close_partial(ticket, volume))
            .await?
            .into_close()
    }

    async fn reconnect(&self) -> std::result::Result<(), ExecutionError> {
        // HTTP connections are pooled per request; nothing to re-establish.
        Ok(())
    }

    async fn ping(&self) -> std::result::Result<(), ExecutionError> {
        self.call(&TerminalRequest::ping()).await?.check()
    }

    fn transport_name(&self) -> &'static str {
        "bridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> BridgeConfig {
        BridgeConfig {
            url: url.into(),
            timeout_ms: 1000,
            token: None,
        }
    }

    #[test]
    fn endpoint_is_joined_under_base_path() {
        let gateway = BridgeGateway::new(&config("http://127.0.0.1:8710/terminal")).unwrap();
        assert_eq!(gateway.endpoint.as_str(), "http://127.0.0.1:8710/terminal/rpc");

        let gateway = BridgeGateway::new(&config("http://127.0.0.1:8710")).unwrap();
        assert_eq!(gateway.endpoint.as_str(), "http://127.0.0.1:8710/rpc");
    }

    #[test]
    fn invalid_url_is_an_error() {
        assert!(BridgeGateway::new(&config("::nope")).is_err());
    }

    #[tokio::test]
    async fn unreachable_bridge_is_transient() {
        // Port 9 (discard) is closed on test hosts.
        let gateway = BridgeGateway::new(&config("http://127.0.0.1:9")).unwrap();
        let err = gateway.ping().await.unwrap_err();
        assert!(err.is_transient());
    }
}
