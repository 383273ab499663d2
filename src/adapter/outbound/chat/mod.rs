//! Chat source adapters.
//!
//! The relay is a small WebSocket service sitting in front of the chat
//! network. It pushes one JSON frame per message and replays history after
//! the cursor given in the subscription.

pub mod dto;
pub mod relay;
