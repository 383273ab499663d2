//! Status projection types for operator-facing adapters.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::id::MessageId;
use crate::domain::lifecycle::Action;
use crate::domain::signal::MessageType;

/// Coarse run state of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Starting,
    Running,
    /// Events are not consumed until started again.
    Paused,
    Stopped,
}

/// A transition that could not be completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub message_id: MessageId,
    pub action: Action,
    pub cause: String,
    pub at: DateTime<Utc>,
}

/// One processed signal, for activity feeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub message_id: MessageId,
    pub message_type: MessageType,
    pub outcome: String,
    pub at: DateTime<Utc>,
}

/// Running totals since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub messages_seen: u64,
    pub signals_routed: u64,
    pub ignored: u64,
    pub opened: u64,
    pub modified: u64,
    pub closed: u64,
    pub discarded: u64,
    pub failures: u64,
}

/// Point-in-time view of the running system.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub run_state: RunState,
    /// Components currently failing their health checks.
    pub degraded: Vec<String>,
    pub transport: String,
    pub started_at: DateTime<Utc>,
    pub open_positions: usize,
    pub pending_positions: usize,
    pub pending_timers: usize,
    pub counters: Counters,
    pub recent_activity: Vec<ActivityEntry>,
}
