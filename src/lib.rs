//! signal-relay: copy trade signals from chat channels to a broker terminal.
//!
//! Chat messages arrive from a relay, a classification service labels them,
//! and the router turns each label into broker actions while keeping a
//! durable record of which tickets belong to which message.
//!
//! # Architecture
//!
//! - [`domain`] - Signals, tracked positions, lifecycles and exit strategies
//! - [`port`] - Traits at the seams: chat stream, classifier, execution
//!   gateway, state repository, operator controls
//! - [`application`] - Position store, per-message locks, completion
//!   timers, router and coordinator
//! - [`adapter`] - Relay WebSocket client, HTTP classifier, terminal
//!   transports, JSON state file and the CLI
//! - [`infrastructure`] - Configuration, factories, reconnection, the
//!   instance lock and process bootstrap
//!
//! # Features
//!
//! - `testkit` - In-memory fakes for the outbound ports and domain fixtures

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
