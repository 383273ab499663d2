//! Opening positions: new signals, pending completion and re-entries.

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{IgnoreReason, Outcome, Router};
use crate::domain::error::DomainError;
use crate::domain::id::{ChannelId, MessageId, Ticket};
use crate::domain::lifecycle::{Action, Lifecycle};
use crate::domain::position::{PositionStatus, Role, TrackedPosition};
use crate::domain::signal::{ClassifiedSignal, Direction, MessageType, OrderKind};
use crate::domain::strategy::LegPlan;
use crate::error::{Error, Result};
use crate::port::outbound::execution::{Fill, OrderRequest};

/// Parameters of a position about to be opened or recorded.
#[derive(Debug, Clone)]
struct EntryDraft {
    message_id: MessageId,
    channel_id: ChannelId,
    symbol: String,
    direction: Direction,
    order_kind: OrderKind,
    entry_price: Option<Decimal>,
    stop_loss: Option<Decimal>,
    take_profits: Vec<Decimal>,
    lot_size: Decimal,
    origin: Option<MessageId>,
}

impl EntryDraft {
    fn is_complete(&self) -> bool {
        self.stop_loss.is_some() && !self.take_profits.is_empty()
    }

    /// Rebuild from placeholder rows.
    fn from_rows(rows: &[TrackedPosition]) -> Option<Self> {
        let first = rows.first()?;
        Some(Self {
            message_id: first.message_id,
            channel_id: first.channel_id.clone(),
            symbol: first.symbol.clone(),
            direction: first.direction,
            order_kind: first.order_kind,
            entry_price: first.entry_price,
            stop_loss: first.stop_loss,
            take_profits: first.take_profits.clone(),
            lot_size: first.lot_size,
            origin: first.origin,
        })
    }

    fn request(&self, plan: &LegPlan) -> OrderRequest {
        OrderRequest {
            request_id: Uuid::new_v4(),
            symbol: self.symbol.clone(),
            direction: self.direction,
            kind: self.order_kind,
            volume: self.lot_size,
            price: self.entry_price,
            stop_loss: self.stop_loss,
            take_profit: plan.take_profit,
            comment: format!("sr:{}:{}", self.message_id, plan.role),
        }
    }

    fn row(&self, plan: &LegPlan, fill: Option<Fill>) -> TrackedPosition {
        let (ticket, status, entry_price, lot_size) = match fill {
            Some(fill) => (
                Some(fill.ticket),
                PositionStatus::Open,
                Some(fill.price),
                fill.volume,
            ),
            None => (
                None,
                PositionStatus::PendingCompletion,
                self.entry_price,
                self.lot_size,
            ),
        };
        TrackedPosition {
            message_id: self.message_id,
            channel_id: self.channel_id.clone(),
            role: plan.role,
            ticket,
            symbol: self.symbol.clone(),
            direction: self.direction,
            order_kind: self.order_kind,
            entry_price,
            stop_loss: self.stop_loss,
            take_profit: plan.take_profit,
            take_profits: self.take_profits.clone(),
            original_stop_loss: self.stop_loss,
            original_take_profits: self.take_profits.clone(),
            lot_size,
            status,
            opened_at: Utc::now(),
            closed_at: None,
            origin: self.origin,
            targets_hit: Vec::new(),
        }
    }
}

impl Router {
    /// NEW_SIGNAL_COMPLETE / NEW_SIGNAL_INCOMPLETE, including edits of a
    /// message that is already tracked.
    pub(super) async fn on_entry(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let id = signal.message_id;
        let _guard = self.inner.locks.lock(id).await;

        match self.inner.store.lifecycle_on(&signal.channel_id, id) {
            Lifecycle::Unseen => self.open_new(&signal).await,
            Lifecycle::PendingCompletion => self.merge_pending(id, &signal).await,
            Lifecycle::Open => self.apply_edit(id, &signal).await,
            Lifecycle::Closed => Ok(ignored(id, IgnoreReason::AlreadyClosed)),
            Lifecycle::Discarded => Ok(ignored(id, IgnoreReason::Discarded)),
        }
    }

    async fn open_new(&self, signal: &ClassifiedSignal) -> Result<Outcome> {
        let id = signal.message_id;
        let (symbol, direction) = signal
            .instrument()
            .map_err(|e| Error::from(e).in_transition(id, Action::Open))?;
        let Some(broker_symbol) = self.inner.policy.symbols.resolve(symbol) else {
            return Ok(ignored(
                id,
                IgnoreReason::SymbolNotAllowed(symbol.to_string()),
            ));
        };
        signal
            .check_stop_side()
            .map_err(|e| Error::from(e).in_transition(id, Action::Open))?;

        let draft = EntryDraft {
            message_id: id,
            channel_id: signal.channel_id.clone(),
            symbol: broker_symbol,
            direction,
            order_kind: signal.order_kind,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            take_profits: signal.take_profits.clone(),
            lot_size: self.lot_for(signal)?,
            origin: None,
        };

        if signal.message_type == MessageType::NewSignalComplete && draft.is_complete() {
            let plans = self.inner.strategy.plan(&draft.take_profits);
            self.open_legs(&draft, &plans, Action::Open).await
        } else {
            self.record_pending(&draft)
        }
    }

    /// Record placeholder rows and start the completion clock.
    fn record_pending(&self, draft: &EntryDraft) -> Result<Outcome> {
        let id = draft.message_id;
        let rows: Vec<TrackedPosition> = self
            .inner
            .strategy
            .plan(&draft.take_profits)
            .iter()
            .map(|plan| draft.row(plan, None))
            .collect();
        let channel = draft.channel_id.clone();

        self.inner
            .store
            .transact(|state| {
                for row in rows {
                    state.upsert(row);
                }
                state.record_signal(&channel, id);
            })
            .map_err(|e| e.in_transition(id, Action::Persist))?;

        let window = self.inner.policy.completion_window;
        self.arm_timer(id, Instant::now() + window);
        info!(
            message_id = %id,
            symbol = %draft.symbol,
            window_secs = window.as_secs(),
            "Incomplete signal recorded, waiting for stop-loss and targets"
        );
        Ok(Outcome::Pending {
            message_id: id,
            expires_in: window,
        })
    }

    /// Fold new parameters into a placeholder, opening it once complete.
    pub(super) async fn merge_pending(
        &self,
        id: MessageId,
        signal: &ClassifiedSignal,
    ) -> Result<Outcome> {
        let rows = self.inner.store.get(id);
        let Some(mut draft) = EntryDraft::from_rows(&rows) else {
            return Ok(ignored(id, IgnoreReason::UnknownTarget));
        };

        if let Some(stop_loss) = signal.stop_loss {
            draft.stop_loss = Some(stop_loss);
        }
        if !signal.take_profits.is_empty() {
            draft.take_profits = signal.take_profits.clone();
        }
        if let Some(entry) = signal.entry_price {
            draft.entry_price = Some(entry);
        }
        if let Some(lot) = signal.lot_size {
            draft.lot_size = lot;
        }
        if signal.message_type.is_entry() {
            draft.order_kind = signal.order_kind;
            if let Some(direction) = signal.direction {
                draft.direction = direction;
            }
            if let Some(symbol) = signal.symbol.as_deref() {
                if let Some(resolved) = self.inner.policy.symbols.resolve(symbol) {
                    draft.symbol = resolved;
                }
            }
        }

        if draft.is_complete() {
            let plans = self.inner.strategy.plan(&draft.take_profits);
            let outcome = self.open_legs(&draft, &plans, Action::Open).await?;
            self.inner.timeouts.cancel(id);
            info!(message_id = %id, "Pending signal completed");
            return Ok(outcome);
        }

        let updated: Vec<TrackedPosition> = self
            .inner
            .strategy
            .plan(&draft.take_profits)
            .iter()
            .map(|plan| {
                let mut row = draft.row(plan, None);
                if let Some(existing) = rows.iter().find(|r| r.role == plan.role) {
                    row.opened_at = existing.opened_at;
                }
                row
            })
            .collect();
        let recorded_at = updated.iter().map(|r| r.opened_at).min();
        self.inner
            .store
            .transact(|state| {
                state.remove(id);
                for row in updated {
                    state.upsert(row);
                }
            })
            .map_err(|e| e.in_transition(id, Action::Persist))?;

        let window = self.inner.policy.completion_window;
        let elapsed = recorded_at
            .and_then(|at| (Utc::now() - at).to_std().ok())
            .unwrap_or_default();
        Ok(Outcome::Pending {
            message_id: id,
            expires_in: window.saturating_sub(elapsed),
        })
    }

    /// A new-signal delivery for an open message: an edit when its stops or
    /// targets differ from what the signal text last said, otherwise a
    /// duplicate. Levels moved since (breakeven, replies) do not count.
    async fn apply_edit(&self, id: MessageId, signal: &ClassifiedSignal) -> Result<Outcome> {
        let legs = self.inner.store.get(id);
        let Some(reference) = legs.iter().find(|leg| leg.is_open()) else {
            return Ok(ignored(id, IgnoreReason::Duplicate));
        };
        let stop_changed = signal
            .stop_loss
            .is_some_and(|sl| reference.signalled_stop_loss() != Some(sl));
        let targets_changed = !signal.take_profits.is_empty()
            && reference.signalled_take_profits() != signal.take_profits.as_slice();

        if !stop_changed && !targets_changed {
            return Ok(ignored(id, IgnoreReason::Duplicate));
        }
        info!(
            message_id = %id,
            stop_changed,
            targets_changed,
            "Edited signal, applying as modification"
        );

        let stop_loss = if stop_changed { signal.stop_loss } else { None };
        let take_profits: &[Decimal] = if targets_changed {
            &signal.take_profits
        } else {
            &[]
        };
        let outcome = self.modify_open(id, stop_loss, take_profits, false).await?;

        self.inner
            .store
            .transact(|state| {
                let rows = state.positions.get_mut(&id).into_iter().flatten();
                for row in rows.filter(|row| row.is_open()) {
                    if stop_changed {
                        row.original_stop_loss = signal.stop_loss;
                    }
                    if targets_changed {
                        row.original_take_profits = signal.take_profits.clone();
                    }
                }
            })
            .map_err(|e| e.in_transition(id, Action::Persist))?;
        Ok(outcome)
    }

    /// RE_ENTRY: a new single-leg position keyed by its own message, with
    /// missing parameters taken from the signal it re-enters.
    pub(super) async fn on_reentry(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let id = signal.message_id;
        let _guard = self.inner.locks.lock(id).await;
        let store = &self.inner.store;

        if store.knows(&signal.channel_id, id) {
            return Ok(ignored(id, IgnoreReason::Duplicate));
        }

        let origin = signal
            .reply_to
            .filter(|reply| store.knows(&signal.channel_id, *reply))
            .or_else(|| store.last_signal(&signal.channel_id))
            .filter(|origin| *origin != id);
        let template = origin.and_then(|o| store.get(o).into_iter().next());

        let symbol = match signal.symbol.as_deref() {
            Some(symbol) => match self.inner.policy.symbols.resolve(symbol) {
                Some(resolved) => Some(resolved),
                None => {
                    return Ok(ignored(
                        id,
                        IgnoreReason::SymbolNotAllowed(symbol.to_string()),
                    ))
                }
            },
            None => template.as_ref().map(|t| t.symbol.clone()),
        };
        let direction = signal.direction.or(template.as_ref().map(|t| t.direction));
        let (Some(symbol), Some(direction)) = (symbol, direction) else {
            return Err(Error::from(DomainError::MissingField {
                message_id: id,
                field: "symbol",
            })
            .in_transition(id, Action::ReEntry));
        };

        let stop_loss = signal
            .stop_loss
            .or(template.as_ref().and_then(|t| t.stop_loss));
        if stop_loss.is_none() {
            return Ok(ignored(id, IgnoreReason::MissingField("stop_loss")));
        }
        let take_profits = if signal.take_profits.is_empty() {
            template
                .as_ref()
                .map(|t| t.take_profits.clone())
                .unwrap_or_default()
        } else {
            signal.take_profits.clone()
        };

        let draft = EntryDraft {
            message_id: id,
            channel_id: signal.channel_id.clone(),
            symbol,
            direction,
            order_kind: signal.order_kind,
            entry_price: signal.entry_price,
            stop_loss,
            take_profits,
            lot_size: self.lot_for(&signal)?,
            origin,
        };
        let plan = LegPlan {
            role: Role::Single,
            take_profit: self
                .inner
                .strategy
                .take_profit_for(Role::Single, &draft.take_profits),
        };
        info!(message_id = %id, origin = ?origin, "Re-entering");
        self.open_legs(&draft, &[plan], Action::ReEntry).await
    }

    /// Place every planned leg and commit them together.
    ///
    /// If a leg fails, the legs already placed for this draft are closed
    /// again and nothing is committed.
    async fn open_legs(
        &self,
        draft: &EntryDraft,
        plans: &[LegPlan],
        action: Action,
    ) -> Result<Outcome> {
        let id = draft.message_id;
        let mut placed: Vec<TrackedPosition> = Vec::with_capacity(plans.len());

        for plan in plans {
            let request = draft.request(plan);
            match self.inner.gateway.place_order(&request).await {
                Ok(fill) => {
                    info!(
                        message_id = %id,
                        role = %plan.role,
                        ticket = %fill.ticket,
                        price = %fill.price,
                        "Leg opened"
                    );
                    placed.push(draft.row(plan, Some(fill)));
                }
                Err(e) => {
                    self.compensate(id, &placed).await;
                    return Err(Error::from(e).in_transition(id, action));
                }
            }
        }

        let tickets: Vec<Ticket> = placed.iter().filter_map(|leg| leg.ticket).collect();
        let channel = draft.channel_id.clone();
        let record_signal = draft.origin.is_none();
        let rows = placed.clone();
        let committed = self.inner.store.transact(|state| {
            state.remove(id);
            for row in rows {
                state.upsert(row);
            }
            if record_signal {
                state.record_signal(&channel, id);
            }
        });

        if let Err(e) = committed {
            self.compensate(id, &placed).await;
            return Err(e.in_transition(id, Action::Persist));
        }
        Ok(Outcome::Opened {
            message_id: id,
            tickets,
        })
    }

    /// Close legs placed by a transition that could not complete.
    async fn compensate(&self, id: MessageId, placed: &[TrackedPosition]) {
        let mut orphaned = Vec::new();
        for leg in placed {
            let Some(ticket) = leg.ticket else { continue };
            match self.inner.gateway.close_position(ticket).await {
                Ok(_) => warn!(message_id = %id, %ticket, "Rolled back leg"),
                Err(e) => {
                    error!(message_id = %id, %ticket, error = %e, "Rollback failed");
                    orphaned.push(ticket);
                }
            }
        }
        if !orphaned.is_empty() {
            error!(
                message_id = %id,
                tickets = ?orphaned,
                "Untracked tickets left at the broker, close them manually"
            );
        }
    }

    fn lot_for(&self, signal: &ClassifiedSignal) -> Result<Decimal> {
        let lot = signal
            .lot_size
            .unwrap_or(self.inner.policy.default_lot_size);
        if lot <= Decimal::ZERO {
            return Err(Error::from(DomainError::NonPositiveVolume { volume: lot })
                .in_transition(signal.message_id, Action::Open));
        }
        Ok(lot)
    }
}

pub(super) fn ignored(message_id: MessageId, reason: IgnoreReason) -> Outcome {
    Outcome::Ignored { message_id, reason }
}
