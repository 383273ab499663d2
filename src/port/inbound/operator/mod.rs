//! Operator-facing inbound ports.

pub mod control;
pub mod status;
