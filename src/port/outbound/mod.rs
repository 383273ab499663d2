//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the collaborators the coordinator drives: the
//! chat source, the classifier, the broker terminal and durable storage.

pub mod chat;
pub mod classifier;
pub mod execution;
pub mod store;
