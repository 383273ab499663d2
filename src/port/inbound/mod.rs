//! Inbound (driving) ports consumed by inbound adapters.
//!
//! - [`operator`]: status, control and maintenance use cases for the CLI and
//!   any other control surface.

pub mod operator;
