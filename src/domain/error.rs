//! Domain validation errors for signal and position types.
//!
//! These errors are returned when a signal does not carry what an operation
//! needs, before any broker call is attempted.

use rust_decimal::Decimal;
use thiserror::Error;

use super::id::MessageId;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A field required to open a position is absent.
    #[error("signal {message_id} is missing {field}")]
    MissingField {
        /// Message the signal came from.
        message_id: MessageId,
        /// Name of the absent field.
        field: &'static str,
    },

    /// Volume must be positive for trading operations.
    #[error("volume must be positive, got {volume}")]
    NonPositiveVolume {
        /// The invalid volume that was provided.
        volume: Decimal,
    },

    /// Stop-loss sits on the wrong side of the entry price.
    #[error("stop-loss {stop_loss} is on the wrong side of entry {entry} for a {direction} order")]
    StopOnWrongSide {
        direction: super::signal::Direction,
        entry: Decimal,
        stop_loss: Decimal,
    },
}
