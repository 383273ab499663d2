//! Infrastructure configuration modules.

pub mod chat;
pub mod execution;
pub mod logging;
pub mod reconnection;
pub mod settings;
pub mod state;
pub mod symbols;
pub mod trading;
