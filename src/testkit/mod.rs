//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`domain`]: builders for signals, legs, orders and chat messages.
//! - [`repository`]: in-memory state repository with failing saves.
//! - [`gateway`]: recording broker gateway with scripted failures.
//! - [`chat`]: scripted and channel-backed chat streams.
//! - [`classifier`]: stub classifier keyed by message id.
//! - [`config`]: canonical test configurations.

pub mod chat;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod repository;
