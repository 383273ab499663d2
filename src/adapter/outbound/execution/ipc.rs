//! Local IPC transport: newline-delimited JSON over a Unix domain socket.
//!
//! One request is in flight at a time; the connection is opened lazily and
//! dropped on any I/O failure so the next call starts clean.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::wire::{TerminalReply, TerminalRequest};
use crate::domain::id::Ticket;
use crate::error::ExecutionError;
use crate::infrastructure::config::execution::IpcConfig;
use crate::port::outbound::execution::{CloseOutcome, ExecutionGateway, Fill, OrderRequest};

type Connection = BufReader<UnixStream>;

/// [`ExecutionGateway`] over a Unix socket.
pub struct IpcGateway {
    socket_path: PathBuf,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl IpcGateway {
    #[must_use]
    pub fn new(config: &IpcConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            timeout: config.timeout(),
            connection: Mutex::new(None),
        }
    }

    async fn open(&self) -> Result<Connection, ExecutionError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            ExecutionError::Transient(format!(
                "cannot connect to {}: {e}",
                self.socket_path.display()
            ))
        })?;
        info!(socket = %self.socket_path.display(), "Connected to terminal socket");
        Ok(BufReader::new(stream))
    }

    async fn call(&self, request: &TerminalRequest) -> Result<TerminalReply, ExecutionError> {
        let mut line = serde_json::to_string(request)
            .map_err(|e| ExecutionError::Rejected(format!("cannot encode request: {e}")))?;
        line.push('\n');

        let mut guard = self.connection.lock().await;
        let mut connection = match guard.take() {
            Some(connection) => connection,
            None => self.open().await?,
        };

        debug!(op = request.op(), id = %request.id(), "IPC request");
        let exchange = async {
            connection.get_mut().write_all(line.as_bytes()).await?;
            let mut reply = String::new();
            let read = connection.read_line(&mut reply).await?;
            if read == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "terminal closed the socket",
                ));
            }
            Ok(reply)
        };

        let reply = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(ExecutionError::Transient(format!("socket error: {e}"))),
            Err(_) => {
                return Err(ExecutionError::Transient(format!(
                    "no reply within {}ms",
                    self.timeout.as_millis()
                )))
            }
        };
        *guard = Some(connection);

        serde_json::from_str(reply.trim_end())
            .map_err(|e| ExecutionError::Rejected(format!("unreadable terminal reply: {e}")))
    }
}

#[async_trait]
impl ExecutionGateway for IpcGateway {
    async fn place_order(&self, request: &OrderRequest) -> Result<Fill, ExecutionError> {
        self.call(&TerminalRequest::place(request))
            .await?
            .into_fill(request)
    }

    async fn modify_position(
        &self,
        ticket: Ticket,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
    ) -> Result<(), ExecutionError> {
        self.call(&TerminalRequest::modify(ticket, stop_loss, take_profit))
            .await?
            .check()
    }

    async fn close_position(&self, ticket: Ticket) -> Result<CloseOutcome, ExecutionError> {
        self.call(&TerminalRequest::close(ticket)).await?.into_close()
    }

    async fn close_partial(
        &self,
        ticket: Ticket,
        volume: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        self.call(&TerminalRequest::close_partial(ticket, volume))
            .await?
            .into_close()
    }

    async fn reconnect(&self) -> Result<(), ExecutionError> {
        let mut guard = self.connection.lock().await;
        guard.take();
        *guard = Some(self.open().await?);
        Ok(())
    }

    async fn ping(&self) -> Result<(), ExecutionError> {
        self.call(&TerminalRequest::ping()).await?.check()
    }

    fn transport_name(&self) -> &'static str {
        "ipc"
    }
}
