//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Chat message identifier.
///
/// Unique within a channel and stable across edits, so it doubles as the
/// key for every position opened from that message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(i64);

impl MessageId {
    /// Create a new `MessageId`.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw numeric identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self::new(id)
    }
}

/// Chat channel identifier - newtype for type safety.
///
/// The inner String is private to ensure all construction goes through
/// the defined constructors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    /// Create a new `ChannelId` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the channel ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Broker-assigned position ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticket(u64);

impl Ticket {
    /// Create a new `Ticket`.
    #[must_use]
    pub const fn new(ticket: u64) -> Self {
        Self(ticket)
    }

    /// Get the raw ticket number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for Ticket {
    fn from(ticket: u64) -> Self {
        Self::new(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_orders_numerically() {
        assert!(MessageId::new(9) < MessageId::new(10));
        assert_eq!(MessageId::from(501).get(), 501);
    }

    #[test]
    fn channel_id_display_and_conversions() {
        let channel = ChannelId::from("gold-signals");
        assert_eq!(channel.as_str(), "gold-signals");
        assert_eq!(channel.to_string(), "gold-signals");
        assert_eq!(ChannelId::from(String::from("gold-signals")), channel);
    }

    #[test]
    fn ticket_display_is_prefixed() {
        assert_eq!(Ticket::new(12345).to_string(), "#12345");
    }

    #[test]
    fn ids_serialize_as_bare_values() {
        assert_eq!(serde_json::to_string(&MessageId::new(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&Ticket::new(8)).unwrap(), "8");
        assert_eq!(
            serde_json::to_string(&ChannelId::new("c")).unwrap(),
            "\"c\""
        );
    }
}
