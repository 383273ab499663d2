//! Broker terminal transports.
//!
//! - [`bridge`]: JSON over HTTP to a bridge process
//! - [`ipc`]: newline-delimited JSON over a Unix socket
//! - [`driver`]: blocking in-process driver, including the paper terminal
//!
//! All of them can be wrapped in [`retry::RetryingGateway`].

pub mod bridge;
pub mod driver;
#[cfg(unix)]
pub mod ipc;
pub mod retry;
pub mod wire;
