//! Managing tracked positions: modifications, profit notifications, closes
//! and compound messages.

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info, warn};

use super::entry::ignored;
use super::{IgnoreReason, Outcome, Router};
use crate::domain::id::MessageId;
use crate::domain::lifecycle::{Action, Lifecycle};
use crate::domain::position::{Role, TrackedPosition};
use crate::domain::signal::{ClassifiedSignal, MessageType};
use crate::domain::strategy::LegAction;
use crate::error::{Error, Result};
use crate::port::outbound::execution::CloseOutcome;

impl Router {
    /// MODIFICATION: complete a placeholder or move stops/targets in place.
    pub(super) async fn on_modification(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let target = self.resolve_target(&signal);
        let _guard = self.inner.locks.lock(target).await;

        match self.inner.store.lifecycle_on(&signal.channel_id, target) {
            Lifecycle::PendingCompletion => self.merge_pending(target, &signal).await,
            Lifecycle::Open => {
                self.modify_open(
                    target,
                    signal.stop_loss,
                    &signal.take_profits,
                    signal.move_sl_to_entry,
                )
                .await
            }
            other => Ok(not_actionable(target, other)),
        }
    }

    /// Apply new stops/targets to every open leg, committing leg by leg.
    ///
    /// A failed leg stops the walk; legs already modified stay committed.
    pub(super) async fn modify_open(
        &self,
        id: MessageId,
        stop_loss: Option<Decimal>,
        take_profits: &[Decimal],
        to_entry: bool,
    ) -> Result<Outcome> {
        let mut modified = 0;

        for leg in self.legs_by_role(id).into_values() {
            let Some(ticket) = leg.ticket else { continue };
            let new_stop = if to_entry {
                leg.entry_price.or(stop_loss).or(leg.stop_loss)
            } else {
                stop_loss.or(leg.stop_loss)
            };
            let new_target = if take_profits.is_empty() {
                leg.take_profit
            } else {
                self.inner
                    .strategy
                    .take_profit_for(leg.role, take_profits)
                    .or(leg.take_profit)
            };
            let ladder_changed = !take_profits.is_empty() && leg.take_profits != take_profits;
            if new_stop == leg.stop_loss && new_target == leg.take_profit && !ladder_changed {
                continue;
            }

            if new_stop != leg.stop_loss || new_target != leg.take_profit {
                self.inner
                    .gateway
                    .modify_position(ticket, new_stop, new_target)
                    .await
                    .map_err(|e| Error::from(e).in_transition(id, Action::Modify))?;
            }

            let mut updated = leg.clone();
            updated.stop_loss = new_stop;
            updated.take_profit = new_target;
            if !take_profits.is_empty() {
                updated.take_profits = take_profits.to_vec();
            }
            self.inner
                .store
                .upsert(updated)
                .map_err(|e| e.in_transition(id, Action::Persist))?;
            info!(
                message_id = %id,
                role = %leg.role,
                %ticket,
                stop_loss = ?new_stop,
                take_profit = ?new_target,
                "Leg modified"
            );
            modified += 1;
        }

        if modified == 0 {
            return Ok(ignored(id, IgnoreReason::NoChange));
        }
        Ok(Outcome::Modified {
            message_id: id,
            legs: modified,
        })
    }

    /// PROFIT_NOTIFICATION: close the leg the hit target belongs to and
    /// optionally protect what remains.
    pub(super) async fn on_profit(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let target = self.resolve_target(&signal);
        let _guard = self.inner.locks.lock(target).await;

        let state = self.inner.store.lifecycle_on(&signal.channel_id, target);
        if state != Lifecycle::Open {
            return Ok(not_actionable(target, state));
        }

        let strategy = &self.inner.strategy;
        let breakeven = self.inner.policy.breakeven_on_first_target || signal.move_sl_to_entry;
        let actions = match signal.tp_hit {
            Some(level) => strategy.on_target(level, breakeven),
            None if signal.move_sl_to_entry => {
                vec![LegAction::MoveStopToEntry(strategy.breakeven_role())]
            }
            None => return Ok(ignored(target, IgnoreReason::Informational)),
        };

        let mut closed = Vec::new();
        let mut protected = None;
        for action in actions {
            match action {
                LegAction::Close(role) => {
                    let Some(leg) = self.legs_by_role(target).remove(&role) else {
                        warn!(message_id = %target, %role, level = ?signal.tp_hit, "No open leg for target");
                        continue;
                    };
                    self.close_leg(target, leg, signal.tp_hit, Action::TakeProfit)
                        .await?;
                    closed.push(role);
                }
                LegAction::MoveStopToEntry(role) => {
                    let Some(leg) = self.legs_by_role(target).remove(&role) else {
                        continue;
                    };
                    if self.move_to_breakeven(target, leg).await? {
                        protected = Some(role);
                    }
                }
            }
        }

        if closed.is_empty() && protected.is_none() {
            return Ok(ignored(
                target,
                IgnoreReason::NoMatchingLeg {
                    level: signal.tp_hit,
                },
            ));
        }
        Ok(Outcome::ProfitTaken {
            message_id: target,
            level: signal.tp_hit,
            closed,
            breakeven: protected,
        })
    }

    /// CLOSE_SIGNAL: cancel a placeholder or close every open leg.
    pub(super) async fn on_close(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let target = self.resolve_target(&signal);
        let _guard = self.inner.locks.lock(target).await;

        match self.inner.store.lifecycle_on(&signal.channel_id, target) {
            Lifecycle::PendingCompletion => {
                self.inner.timeouts.cancel(target);
                self.inner
                    .store
                    .transact(|state| {
                        state.discard(target);
                    })
                    .map_err(|e| e.in_transition(target, Action::Persist))?;
                info!(message_id = %target, "Pending signal cancelled");
                Ok(Outcome::Discarded { message_id: target })
            }
            Lifecycle::Open => {
                let mut legs = 0;
                for leg in self.legs_by_role(target).into_values() {
                    self.close_leg(target, leg, None, Action::Close).await?;
                    legs += 1;
                }
                Ok(Outcome::Closed {
                    message_id: target,
                    legs,
                })
            }
            other => Ok(not_actionable(target, other)),
        }
    }

    /// PARTIAL_CLOSE: close a percentage of every open leg.
    ///
    /// Each share rounds down to the lot step. A share that rounds to nothing
    /// leaves the leg alone; one that covers the whole leg closes it.
    pub(super) async fn on_partial_close(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let target = self.resolve_target(&signal);
        let _guard = self.inner.locks.lock(target).await;

        let state = self.inner.store.lifecycle_on(&signal.channel_id, target);
        if state != Lifecycle::Open {
            return Ok(not_actionable(target, state));
        }
        let percentage = signal.close_percentage.filter(|p| *p > 0).map(|p| p.min(100));
        let Some(percentage) = percentage else {
            return Ok(ignored(target, IgnoreReason::MissingField("close_percentage")));
        };

        let mut reduced = Vec::new();
        let mut closed = Vec::new();
        for leg in self.legs_by_role(target).into_values() {
            let Some(ticket) = leg.ticket else { continue };
            let role = leg.role;
            let volume = partial_volume(leg.lot_size, percentage);
            if volume.is_zero() {
                debug!(
                    message_id = %target,
                    %role,
                    lot_size = %leg.lot_size,
                    "Share below lot step"
                );
                continue;
            }
            if volume >= leg.lot_size {
                self.close_leg(target, leg, None, Action::PartialClose)
                    .await?;
                closed.push(role);
                continue;
            }

            let result = self
                .inner
                .gateway
                .close_partial(ticket, volume)
                .await
                .map_err(|e| Error::from(e).in_transition(target, Action::PartialClose))?;
            let mut updated = leg;
            if result == CloseOutcome::AlreadyClosed {
                info!(message_id = %target, %ticket, "Ticket already closed at broker");
                updated.close(Utc::now());
                closed.push(role);
            } else {
                updated.lot_size -= volume;
                reduced.push(role);
            }
            let remaining = updated.lot_size;
            self.inner
                .store
                .upsert(updated)
                .map_err(|e| e.in_transition(target, Action::Persist))?;
            info!(
                message_id = %target,
                %role,
                %ticket,
                %volume,
                %remaining,
                "Leg partially closed"
            );
        }

        if reduced.is_empty() && closed.is_empty() {
            return Ok(ignored(target, IgnoreReason::NoChange));
        }
        Ok(Outcome::PartiallyClosed {
            message_id: target,
            percentage,
            reduced,
            closed,
        })
    }

    /// COMPOUND_ACTION: replay the steps, follow-ups before new entries.
    ///
    /// A new entry without its own stop-loss takes the one set by a
    /// modification step in the same message. Failed steps are reported in
    /// the outcome and do not stop the remaining steps.
    pub(super) async fn on_compound(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let id = signal.message_id;
        let steps: Vec<ClassifiedSignal> = signal
            .steps
            .iter()
            .cloned()
            .map(|step| step.into_signal(&signal))
            .filter(|step| step.message_type != MessageType::CompoundAction)
            .collect();
        if steps.is_empty() {
            return Ok(ignored(id, IgnoreReason::EmptyCompound));
        }

        let (mut entries, follow_ups): (Vec<_>, Vec<_>) = steps
            .into_iter()
            .partition(|step| step.message_type.is_entry() || step.message_type == MessageType::ReEntry);
        if entries.len() > 1 {
            warn!(message_id = %id, entries = entries.len(), "Compound with several entries, keeping the first");
            entries.truncate(1);
        }
        let inherited_stop = follow_ups
            .iter()
            .filter(|step| step.message_type == MessageType::Modification)
            .filter_map(|step| step.stop_loss)
            .last();

        let mut outcomes = Vec::with_capacity(follow_ups.len() + entries.len());
        for step in follow_ups {
            let action = step_action(step.message_type);
            match self.dispatch(step).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(Outcome::failed(id, action, &e)),
            }
        }
        for mut step in entries {
            if step.stop_loss.is_none() {
                step.stop_loss = inherited_stop;
            }
            let action = step_action(step.message_type);
            match self.dispatch(step).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(Outcome::failed(id, action, &e)),
            }
        }

        Ok(Outcome::Compound {
            message_id: id,
            steps: outcomes,
        })
    }

    /// Close one leg and commit it. A ticket already gone at the broker
    /// counts as closed.
    async fn close_leg(
        &self,
        id: MessageId,
        leg: TrackedPosition,
        level: Option<u8>,
        action: Action,
    ) -> Result<()> {
        let Some(ticket) = leg.ticket else {
            return Ok(());
        };
        let result = self
            .inner
            .gateway
            .close_position(ticket)
            .await
            .map_err(|e| Error::from(e).in_transition(id, action))?;
        if result == CloseOutcome::AlreadyClosed {
            info!(message_id = %id, %ticket, "Ticket already closed at broker");
        }

        let role = leg.role;
        let mut updated = leg;
        updated.close(Utc::now());
        if let Some(level) = level {
            updated.record_target(level);
        }
        self.inner
            .store
            .upsert(updated)
            .map_err(|e| e.in_transition(id, Action::Persist))?;
        info!(message_id = %id, %role, %ticket, "Leg closed");
        Ok(())
    }

    /// Move a leg's stop to its entry price. Returns whether anything moved.
    async fn move_to_breakeven(&self, id: MessageId, leg: TrackedPosition) -> Result<bool> {
        let (Some(ticket), Some(entry)) = (leg.ticket, leg.entry_price) else {
            return Ok(false);
        };
        if leg.stop_loss == Some(entry) {
            return Ok(false);
        }
        self.inner
            .gateway
            .modify_position(ticket, Some(entry), leg.take_profit)
            .await
            .map_err(|e| Error::from(e).in_transition(id, Action::Breakeven))?;

        let role: Role = leg.role;
        let mut updated = leg;
        updated.stop_loss = Some(entry);
        self.inner
            .store
            .upsert(updated)
            .map_err(|e| e.in_transition(id, Action::Persist))?;
        info!(message_id = %id, %role, %ticket, %entry, "Stop moved to break-even");
        Ok(true)
    }
}

fn not_actionable(target: MessageId, state: Lifecycle) -> Outcome {
    let reason = match state {
        Lifecycle::Unseen => IgnoreReason::UnknownTarget,
        Lifecycle::Closed => IgnoreReason::AlreadyClosed,
        Lifecycle::Discarded => IgnoreReason::Discarded,
        other => IgnoreReason::NotOpen { state: other },
    };
    ignored(target, reason)
}

/// Decimal places of the broker lot step (0.01).
const LOT_STEP_DP: u32 = 2;

/// `percentage` of `lot_size`, rounded down to the lot step.
fn partial_volume(lot_size: Decimal, percentage: u8) -> Decimal {
    (lot_size * Decimal::from(percentage) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(LOT_STEP_DP, RoundingStrategy::ToZero)
}

fn step_action(message_type: MessageType) -> Action {
    match message_type {
        MessageType::Modification => Action::Modify,
        MessageType::ProfitNotification => Action::TakeProfit,
        MessageType::CloseSignal => Action::Close,
        MessageType::PartialClose => Action::PartialClose,
        MessageType::ReEntry => Action::ReEntry,
        _ => Action::Open,
    }
}
