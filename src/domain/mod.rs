//! Pure domain types: signals, tracked positions, state and exit strategies.
//!
//! Nothing here performs I/O.

pub mod error;
pub mod id;
pub mod lifecycle;
pub mod message;
pub mod position;
pub mod signal;
pub mod state;
pub mod strategy;
pub mod symbol;
