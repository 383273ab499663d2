//! Factory functions that build adapters from configuration.
//!
//! # Submodules
//!
//! - [`chat`]: chat stream and classifier construction
//! - [`execution`]: terminal gateway construction, wrapped in retries
//! - [`persistence`]: state repository and position store

pub mod chat;
pub mod execution;
pub mod persistence;

#[cfg(test)]
mod tests;
