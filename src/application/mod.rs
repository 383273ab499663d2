//! Application services (use cases).
//!
//! The router owns the per-message state machine; the coordinator feeds it
//! from the chat stream. Everything here talks to the outside world only
//! through ports.

pub mod backoff;
pub mod coordinator;
pub mod locks;
pub mod router;
pub mod status;
pub mod store;
pub mod timeout;
