//! Outbound adapters (driven side).

pub mod chat;
pub mod classifier;
pub mod execution;
pub mod json_store;
