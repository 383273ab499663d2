//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! routing logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`config`] - Configuration loading and validation
//! - [`factory`] - Adapter construction from configuration
//! - [`lock`] - Single-instance guard next to the state file
//! - [`reconnecting`] - Chat stream reconnection with circuit breaker
//! - [`reporting`] - Execution health reporting around the gateway

pub mod bootstrap;
pub mod config;
pub mod factory;
pub mod lock;
pub mod reconnecting;
pub mod reporting;
