//! Signal router: the per-message state machine.
//!
//! ```text
//! UNSEEN ──complete──▶ OPEN ──close / last target──▶ CLOSED
//!    │                   ▲
//!    └──incomplete──▶ PENDING ──timeout / close──▶ DISCARDED
//! ```
//!
//! Every transition runs under the message's lock, performs its broker calls
//! through the gateway, and commits the result to the [`PositionStore`].
//! Duplicate deliveries never reach the broker twice.

mod entry;
mod manage;
mod outcome;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

pub use outcome::{IgnoreReason, Outcome};

use crate::application::locks::KeyedLocks;
use crate::application::store::PositionStore;
use crate::application::timeout::TimeoutSupervisor;
use crate::domain::id::MessageId;
use crate::domain::lifecycle::{Action, Lifecycle};
use crate::domain::position::{Role, TrackedPosition};
use crate::domain::signal::{ClassifiedSignal, MessageType};
use crate::domain::strategy::ExitStrategy;
use crate::domain::symbol::SymbolPolicy;
use crate::error::Result;
use crate::port::outbound::execution::ExecutionGateway;

/// Retry delay when discarding an expired placeholder could not be saved.
const EXPIRY_RETRY: Duration = Duration::from_secs(5);

/// Knobs that shape routing decisions.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    /// Signals below this confidence are recorded and otherwise ignored.
    pub min_confidence: f64,
    /// How long an incomplete signal may wait for its stop-loss and targets.
    pub completion_window: Duration,
    /// Volume used when a signal does not name one.
    pub default_lot_size: Decimal,
    /// Move the surviving leg to break-even when the first target fires.
    pub breakeven_on_first_target: bool,
    pub symbols: SymbolPolicy,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.7,
            completion_window: Duration::from_secs(120),
            default_lot_size: Decimal::new(1, 2),
            breakeven_on_first_target: true,
            symbols: SymbolPolicy::default(),
        }
    }
}

struct RouterInner {
    store: Arc<PositionStore>,
    gateway: Arc<dyn ExecutionGateway>,
    strategy: Box<dyn ExitStrategy>,
    policy: RoutingPolicy,
    locks: KeyedLocks,
    timeouts: TimeoutSupervisor,
}

/// Routes classified signals to broker actions. Cheap to clone.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    #[must_use]
    pub fn new(
        store: Arc<PositionStore>,
        gateway: Arc<dyn ExecutionGateway>,
        strategy: Box<dyn ExitStrategy>,
        policy: RoutingPolicy,
    ) -> Self {
        let timeouts = TimeoutSupervisor::new(policy.completion_window);
        info!(
            strategy = strategy.name(),
            transport = gateway.transport_name(),
            min_confidence = policy.min_confidence,
            window_secs = policy.completion_window.as_secs(),
            "Router ready"
        );
        Self {
            inner: Arc::new(RouterInner {
                store,
                gateway,
                strategy,
                policy,
                locks: KeyedLocks::new(),
                timeouts,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<PositionStore> {
        &self.inner.store
    }

    /// Number of armed completion timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timeouts.pending()
    }

    /// Route one classified signal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transition`](crate::error::Error::Transition) when a
    /// broker call or the state write fails. State is left at its last
    /// committed value.
    pub async fn handle(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        let floor = self.inner.policy.min_confidence;
        if signal.confidence < floor {
            info!(
                message_id = %signal.message_id,
                message_type = %signal.message_type,
                confidence = signal.confidence,
                floor,
                "Signal below confidence floor, not acting"
            );
            return Ok(Outcome::Ignored {
                message_id: signal.message_id,
                reason: IgnoreReason::LowConfidence {
                    confidence: signal.confidence,
                    floor,
                },
            });
        }

        let message_id = signal.message_id;
        let message_type = signal.message_type;
        let outcome = if message_type == MessageType::CompoundAction {
            self.on_compound(signal).await
        } else {
            self.dispatch(signal).await
        };

        match &outcome {
            Ok(outcome) => info!(%message_id, %message_type, %outcome, "Signal routed"),
            Err(e) => error!(%message_id, %message_type, error = %e, "Signal routing failed"),
        }
        outcome
    }

    /// Route a non-compound signal.
    async fn dispatch(&self, signal: ClassifiedSignal) -> Result<Outcome> {
        match signal.message_type {
            MessageType::NewSignalComplete | MessageType::NewSignalIncomplete => {
                self.on_entry(signal).await
            }
            MessageType::Modification => self.on_modification(signal).await,
            MessageType::ReEntry => self.on_reentry(signal).await,
            MessageType::ProfitNotification => self.on_profit(signal).await,
            MessageType::CloseSignal => self.on_close(signal).await,
            MessageType::PartialClose => self.on_partial_close(signal).await,
            MessageType::CompoundAction => Ok(Outcome::Ignored {
                message_id: signal.message_id,
                reason: IgnoreReason::NestedCompound,
            }),
        }
    }

    /// Message a follow-up acts on.
    ///
    /// The replied-to message when it is known, else the message itself when
    /// known (edits), else the channel's latest signal.
    fn resolve_target(&self, signal: &ClassifiedSignal) -> MessageId {
        let store = &self.inner.store;
        if let Some(reply_to) = signal.reply_to {
            if store.knows(&signal.channel_id, reply_to) {
                return reply_to;
            }
        }
        if store.knows(&signal.channel_id, signal.message_id) {
            return signal.message_id;
        }
        match store.last_signal(&signal.channel_id) {
            Some(last) => {
                debug!(
                    message_id = %signal.message_id,
                    target = %last,
                    "No explicit target, using channel's last signal"
                );
                last
            }
            None => signal.message_id,
        }
    }

    /// Discard a placeholder whose completion window elapsed.
    ///
    /// Acts only when `generation` is still the live timer for `id`, so a
    /// completion that won the race always wins.
    pub async fn expire(&self, id: MessageId, generation: u64) -> Result<Outcome> {
        let _guard = self.inner.locks.lock(id).await;
        let timeouts = &self.inner.timeouts;

        if !timeouts.is_current(id, generation) {
            return Ok(Outcome::Ignored {
                message_id: id,
                reason: IgnoreReason::StaleTimer,
            });
        }
        timeouts.retire(id, generation);

        let state = self.inner.store.lifecycle(id);
        if state != Lifecycle::PendingCompletion {
            return Ok(Outcome::Ignored {
                message_id: id,
                reason: IgnoreReason::NotPending { state },
            });
        }

        if let Err(e) = self.inner.store.transact(|state| {
            state.discard(id);
        }) {
            self.arm_timer(id, Instant::now() + EXPIRY_RETRY);
            return Err(e.in_transition(id, Action::Expire));
        }

        warn!(message_id = %id, "Incomplete signal expired, placeholder discarded");
        Ok(Outcome::Discarded { message_id: id })
    }

    /// Re-arm timers for placeholders loaded from disk.
    pub fn resume_pending(&self) -> usize {
        let window = self.inner.policy.completion_window;
        let pending = self.inner.store.snapshot().pending();
        for (id, recorded_at) in &pending {
            let elapsed = (Utc::now() - *recorded_at).to_std().unwrap_or_default();
            let remaining = window.saturating_sub(elapsed);
            info!(
                message_id = %id,
                remaining_secs = remaining.as_secs(),
                "Resuming completion timer"
            );
            self.arm_timer(*id, Instant::now() + remaining);
        }
        pending.len()
    }

    /// Cancel every timer.
    pub fn shutdown(&self) {
        let cancelled = self.inner.timeouts.cancel_all();
        info!(cancelled, "Router shut down");
    }

    /// Cancel every timer and wipe the stored state.
    pub fn clear(&self) -> Result<()> {
        self.inner.timeouts.cancel_all();
        self.inner.store.clear()
    }

    fn arm_timer(&self, id: MessageId, deadline: Instant) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.timeouts.arm(id, deadline, move |generation| async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let router = Router { inner };
            match router.expire(id, generation).await {
                Ok(outcome) => debug!(message_id = %id, %outcome, "Completion timer fired"),
                Err(e) => error!(message_id = %id, error = %e, "Failed to expire placeholder"),
            }
        });
    }

    /// Rows of `id` keyed by role, open legs only.
    fn legs_by_role(&self, id: MessageId) -> BTreeMap<Role, TrackedPosition> {
        self.inner
            .store
            .get(id)
            .into_iter()
            .filter(|leg| leg.is_open())
            .map(|leg| (leg.role, leg))
            .collect()
    }
}
