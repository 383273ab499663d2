//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!   chat relay ────▶ │      Application        │ ────▶ broker terminal
//!   classifier ────▶ │  router, store, timers  │ ────▶ state file
//!                    └─────────────────────────┘
//!                                ▲
//!                                │ operator (CLI)
//! ```

pub mod inbound;
pub mod outbound;
