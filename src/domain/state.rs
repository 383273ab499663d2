//! The durable bot state: every tracked row plus per-channel bookkeeping.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ChannelId, MessageId};
use super::lifecycle::Lifecycle;
use super::position::TrackedPosition;

/// Terminal identifiers remembered per channel, per kind, before they fold
/// into the channel horizon.
pub const TERMINAL_RETENTION: usize = 500;

/// All state that must survive a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotState {
    /// Rows per source message. Never more than two per message.
    #[serde(default)]
    pub positions: BTreeMap<MessageId, Vec<TrackedPosition>>,
    /// Last processed message per channel.
    #[serde(default)]
    pub cursors: BTreeMap<ChannelId, MessageId>,
    /// Last new signal per channel, the fallback target for follow-ups.
    #[serde(default)]
    pub last_signals: BTreeMap<ChannelId, MessageId>,
    /// Identifiers whose placeholder expired or was cancelled.
    #[serde(default)]
    pub discarded: BTreeMap<MessageId, ChannelId>,
    /// Fully closed messages whose rows were pruned.
    #[serde(default)]
    pub retired: BTreeMap<MessageId, ChannelId>,
    /// Newest terminal identifier per channel that fell out of retention.
    /// Untracked identifiers at or below it are treated as closed.
    #[serde(default)]
    pub horizons: BTreeMap<ChannelId, MessageId>,
}

impl BotState {
    /// Rows for a message, empty when untracked.
    #[must_use]
    pub fn legs(&self, id: MessageId) -> &[TrackedPosition] {
        self.positions.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the message has any rows.
    #[must_use]
    pub fn is_tracked(&self, id: MessageId) -> bool {
        self.positions.get(&id).is_some_and(|rows| !rows.is_empty())
    }

    #[must_use]
    pub fn is_discarded(&self, id: MessageId) -> bool {
        self.discarded.contains_key(&id)
    }

    /// Whether the message was closed and its rows pruned.
    #[must_use]
    pub fn is_retired(&self, id: MessageId) -> bool {
        self.retired.contains_key(&id)
    }

    /// Whether `id` is at or below the channel's retention horizon.
    #[must_use]
    pub fn is_past_horizon(&self, channel: &ChannelId, id: MessageId) -> bool {
        self.horizons.get(channel).is_some_and(|horizon| id <= *horizon)
    }

    /// Whether the message has rows or reached a terminal state.
    #[must_use]
    pub fn knows(&self, channel: &ChannelId, id: MessageId) -> bool {
        self.is_tracked(id)
            || self.is_discarded(id)
            || self.is_retired(id)
            || self.is_past_horizon(channel, id)
    }

    /// Aggregate lifecycle of a message.
    #[must_use]
    pub fn lifecycle(&self, id: MessageId) -> Lifecycle {
        if self.is_discarded(id) {
            return Lifecycle::Discarded;
        }
        let legs = self.legs(id);
        if legs.is_empty() {
            if self.is_retired(id) {
                Lifecycle::Closed
            } else {
                Lifecycle::Unseen
            }
        } else if legs.iter().any(TrackedPosition::is_pending) {
            Lifecycle::PendingCompletion
        } else if legs.iter().any(TrackedPosition::is_open) {
            Lifecycle::Open
        } else {
            Lifecycle::Closed
        }
    }

    /// Lifecycle of a message seen on `channel`. An untracked identifier
    /// past the channel horizon is closed rather than unseen.
    #[must_use]
    pub fn lifecycle_on(&self, channel: &ChannelId, id: MessageId) -> Lifecycle {
        match self.lifecycle(id) {
            Lifecycle::Unseen if self.is_past_horizon(channel, id) => Lifecycle::Closed,
            other => other,
        }
    }

    /// Insert a row, replacing any row with the same message and role.
    pub fn upsert(&mut self, position: TrackedPosition) {
        let rows = self.positions.entry(position.message_id).or_default();
        match rows.iter_mut().find(|row| row.role == position.role) {
            Some(existing) => *existing = position,
            None => rows.push(position),
        }
    }

    /// Drop every row of a message.
    pub fn remove(&mut self, id: MessageId) -> Vec<TrackedPosition> {
        self.positions.remove(&id).unwrap_or_default()
    }

    /// Drop a tracked message's rows and mark it terminally discarded.
    /// Untracked identifiers are left alone.
    pub fn discard(&mut self, id: MessageId) -> Vec<TrackedPosition> {
        let rows = self.remove(id);
        if let Some(first) = rows.first() {
            self.discarded.insert(id, first.channel_id.clone());
        }
        rows
    }

    /// Move the channel cursor forward. Never moves it back.
    pub fn advance_cursor(&mut self, channel: &ChannelId, id: MessageId) -> bool {
        match self.cursors.get(channel) {
            Some(current) if *current >= id => false,
            _ => {
                self.cursors.insert(channel.clone(), id);
                true
            }
        }
    }

    /// Remember `id` as the channel's latest new signal.
    pub fn record_signal(&mut self, channel: &ChannelId, id: MessageId) {
        match self.last_signals.get(channel) {
            Some(current) if *current >= id => {}
            _ => {
                self.last_signals.insert(channel.clone(), id);
            }
        }
    }

    /// Pending messages with the time their placeholder was recorded.
    #[must_use]
    pub fn pending(&self) -> Vec<(MessageId, DateTime<Utc>)> {
        self.positions
            .iter()
            .filter(|(_, rows)| rows.iter().any(TrackedPosition::is_pending))
            .filter_map(|(id, rows)| rows.iter().map(|r| r.opened_at).min().map(|at| (*id, at)))
            .collect()
    }

    /// Iterate every row.
    pub fn rows(&self) -> impl Iterator<Item = &TrackedPosition> {
        self.positions.values().flatten()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.rows().filter(|r| r.is_open()).count()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.rows().filter(|r| r.is_pending()).count()
    }

    /// Keep at most `max_closed` fully closed messages, retiring the oldest.
    ///
    /// Retired and discarded identifiers are kept per channel up to
    /// [`TERMINAL_RETENTION`]; older ones raise the channel horizon instead
    /// of being forgotten.
    pub fn prune(&mut self, max_closed: usize) -> usize {
        let mut closed: Vec<(DateTime<Utc>, MessageId)> = self
            .positions
            .iter()
            .filter(|(_, rows)| !rows.is_empty() && rows.iter().all(TrackedPosition::is_closed))
            .map(|(id, rows)| {
                let last = rows
                    .iter()
                    .map(|r| r.closed_at.unwrap_or(r.opened_at))
                    .max()
                    .unwrap_or_default();
                (last, *id)
            })
            .collect();

        let mut removed = 0;
        if closed.len() > max_closed {
            closed.sort();
            let excess = closed.len() - max_closed;
            for (_, id) in closed.into_iter().take(excess) {
                let rows = self.remove(id);
                if let Some(first) = rows.first() {
                    self.retired.insert(id, first.channel_id.clone());
                }
                removed += 1;
            }
        }

        fold_into_horizon(&mut self.retired, &mut self.horizons);
        fold_into_horizon(&mut self.discarded, &mut self.horizons);
        removed
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Trim `terminal` to [`TERMINAL_RETENTION`] ids per channel, raising each
/// channel's horizon to the newest id evicted.
fn fold_into_horizon(
    terminal: &mut BTreeMap<MessageId, ChannelId>,
    horizons: &mut BTreeMap<ChannelId, MessageId>,
) {
    let mut per_channel: BTreeMap<&ChannelId, Vec<MessageId>> = BTreeMap::new();
    for (id, channel) in terminal.iter() {
        per_channel.entry(channel).or_default().push(*id);
    }

    let mut evicted: Vec<(ChannelId, Vec<MessageId>)> = Vec::new();
    for (channel, ids) in per_channel {
        if ids.len() > TERMINAL_RETENTION {
            let excess = ids.len() - TERMINAL_RETENTION;
            evicted.push((channel.clone(), ids[..excess].to_vec()));
        }
    }

    for (channel, ids) in evicted {
        for id in &ids {
            terminal.remove(id);
        }
        if let Some(newest) = ids.last().copied() {
            let horizon = horizons.entry(channel).or_insert(newest);
            if *horizon < newest {
                *horizon = newest;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::Ticket;
    use crate::domain::position::{PositionStatus, Role};
    use crate::domain::signal::{Direction, OrderKind};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn row(id: i64, role: Role, status: PositionStatus) -> TrackedPosition {
        TrackedPosition {
            message_id: MessageId::new(id),
            channel_id: ChannelId::new("c"),
            role,
            ticket: Some(Ticket::new(id as u64 * 10)),
            symbol: "EURUSD".into(),
            direction: Direction::Sell,
            order_kind: OrderKind::Market,
            entry_price: None,
            stop_loss: Some(dec!(1.1)),
            take_profit: None,
            take_profits: Vec::new(),
            original_stop_loss: Some(dec!(1.1)),
            original_take_profits: Vec::new(),
            lot_size: dec!(0.01),
            status,
            opened_at: Utc::now(),
            closed_at: None,
            origin: None,
            targets_hit: Vec::new(),
        }
    }

    #[test]
    fn upsert_replaces_same_role() {
        let mut state = BotState::default();
        state.upsert(row(1, Role::Scalp, PositionStatus::Open));
        state.upsert(row(1, Role::Runner, PositionStatus::Open));
        let mut closed = row(1, Role::Scalp, PositionStatus::Open);
        closed.close(Utc::now());
        state.upsert(closed);

        assert_eq!(state.legs(MessageId::new(1)).len(), 2);
        assert_eq!(state.lifecycle(MessageId::new(1)), Lifecycle::Open);
    }

    #[test]
    fn lifecycle_follows_rows() {
        let mut state = BotState::default();
        let id = MessageId::new(5);
        assert_eq!(state.lifecycle(id), Lifecycle::Unseen);

        state.upsert(row(5, Role::Single, PositionStatus::PendingCompletion));
        assert_eq!(state.lifecycle(id), Lifecycle::PendingCompletion);

        state.upsert(row(5, Role::Single, PositionStatus::Closed));
        assert_eq!(state.lifecycle(id), Lifecycle::Closed);

        state.discard(id);
        assert_eq!(state.lifecycle(id), Lifecycle::Discarded);
        assert!(state.legs(id).is_empty());
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let mut state = BotState::default();
        let channel = ChannelId::new("c");
        assert!(state.advance_cursor(&channel, MessageId::new(10)));
        assert!(!state.advance_cursor(&channel, MessageId::new(9)));
        assert_eq!(state.cursors[&channel], MessageId::new(10));
    }

    #[test]
    fn prune_keeps_newest_closed() {
        let mut state = BotState::default();
        let base = Utc::now();
        for id in 1..=5 {
            let mut r = row(id, Role::Single, PositionStatus::Open);
            r.close(base + Duration::seconds(id));
            state.upsert(r);
        }
        state.upsert(row(6, Role::Single, PositionStatus::Open));

        assert_eq!(state.prune(2), 3);
        let kept: Vec<i64> = state.positions.keys().map(|id| id.get()).collect();
        assert_eq!(kept, vec![4, 5, 6]);
        for id in 1..=3 {
            assert!(state.is_retired(MessageId::new(id)));
            assert_eq!(state.lifecycle(MessageId::new(id)), Lifecycle::Closed);
        }
    }

    #[test]
    fn terminal_ids_past_retention_fold_into_channel_horizon() {
        let mut state = BotState::default();
        let channel = ChannelId::new("c");
        let other = ChannelId::new("d");
        let extra = TERMINAL_RETENTION as i64 + 3;
        for id in 1..=extra {
            state.upsert(row(id, Role::Single, PositionStatus::PendingCompletion));
            state.discard(MessageId::new(id));
        }
        let mut elsewhere = row(9_000, Role::Single, PositionStatus::PendingCompletion);
        elsewhere.channel_id = other.clone();
        state.upsert(elsewhere);
        state.discard(MessageId::new(9_000));

        state.prune(10);

        assert_eq!(state.discarded.len(), TERMINAL_RETENTION + 1);
        assert_eq!(state.horizons.get(&channel), Some(&MessageId::new(3)));
        assert_eq!(state.horizons.get(&other), None);
        assert_eq!(state.lifecycle(MessageId::new(2)), Lifecycle::Unseen);
        assert_eq!(state.lifecycle_on(&channel, MessageId::new(2)), Lifecycle::Closed);
        assert_eq!(state.lifecycle_on(&other, MessageId::new(2)), Lifecycle::Unseen);
        assert!(state.knows(&channel, MessageId::new(1)));
        assert!(!state.knows(&channel, MessageId::new(extra + 1)));
        assert_eq!(
            state.lifecycle_on(&channel, MessageId::new(extra)),
            Lifecycle::Discarded
        );
    }

    #[test]
    fn discarding_an_untracked_id_records_nothing() {
        let mut state = BotState::default();
        assert!(state.discard(MessageId::new(42)).is_empty());
        assert!(!state.is_discarded(MessageId::new(42)));
    }

    #[test]
    fn round_trips_through_json_with_integer_keys() {
        let mut state = BotState::default();
        state.upsert(row(501, Role::Scalp, PositionStatus::Open));
        state
            .discarded
            .insert(MessageId::new(502), ChannelId::new("c"));
        state.retired.insert(MessageId::new(500), ChannelId::new("c"));
        state
            .horizons
            .insert(ChannelId::new("c"), MessageId::new(12));
        state.advance_cursor(&ChannelId::new("c"), MessageId::new(502));

        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"501\""));
        let back: BotState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
