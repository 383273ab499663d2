//! Runtime status shared between the coordinator, the reconnect wrapper and
//! operator surfaces.

use std::collections::{BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::application::router::Outcome;
use crate::domain::id::MessageId;
use crate::domain::lifecycle::Action;
use crate::domain::signal::MessageType;
use crate::error::Error;
use crate::port::inbound::operator::status::{
    ActivityEntry, Counters, FailureReport, RunState,
};

const RECENT_LIMIT: usize = 50;

/// Lifecycle, health and counters of a running instance.
pub struct RuntimeStatus {
    started_at: DateTime<Utc>,
    transport: String,
    run_state: RwLock<RunState>,
    degraded: RwLock<BTreeSet<String>>,
    counters: Mutex<Counters>,
    failures: Mutex<VecDeque<FailureReport>>,
    activity: Mutex<VecDeque<ActivityEntry>>,
}

impl RuntimeStatus {
    #[must_use]
    pub fn new(transport: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            transport: transport.into(),
            run_state: RwLock::new(RunState::Starting),
            degraded: RwLock::new(BTreeSet::new()),
            counters: Mutex::new(Counters::default()),
            failures: Mutex::new(VecDeque::new()),
            activity: Mutex::new(VecDeque::new()),
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn transport(&self) -> &str {
        &self.transport
    }

    #[must_use]
    pub fn run_state(&self) -> RunState {
        *self.run_state.read()
    }

    pub fn set_run_state(&self, state: RunState) {
        let mut current = self.run_state.write();
        if *current != state {
            info!(from = ?*current, to = ?state, "Run state changed");
            *current = state;
        }
    }

    /// Flag a component as failing. Logged once per transition.
    pub fn mark_degraded(&self, component: &str) {
        if self.degraded.write().insert(component.to_string()) {
            warn!(component, "Component degraded");
        }
    }

    pub fn mark_recovered(&self, component: &str) {
        if self.degraded.write().remove(component) {
            info!(component, "Component recovered");
        }
    }

    #[must_use]
    pub fn is_degraded(&self, component: &str) -> bool {
        self.degraded.read().contains(component)
    }

    #[must_use]
    pub fn degraded(&self) -> Vec<String> {
        self.degraded.read().iter().cloned().collect()
    }

    pub fn message_seen(&self) {
        self.counters.lock().messages_seen += 1;
    }

    #[must_use]
    pub fn counters(&self) -> Counters {
        *self.counters.lock()
    }

    /// Fold a router outcome into counters, activity and failures.
    pub fn record_outcome(&self, message_type: MessageType, outcome: &Outcome) {
        {
            let mut counters = self.counters.lock();
            counters.signals_routed += 1;
            tally(&mut counters, outcome);
        }
        for (message_id, action, cause) in outcome.failures() {
            self.push_failure(message_id, action, cause);
        }
        self.push_activity(ActivityEntry {
            message_id: outcome.message_id(),
            message_type,
            outcome: outcome.to_string(),
            at: Utc::now(),
        });
    }

    /// Record a transition error returned by the router.
    pub fn record_error(&self, message_id: MessageId, error: &Error) {
        let (message_id, action, cause) = match error {
            Error::Transition {
                message_id,
                action,
                source,
            } => (*message_id, *action, source.to_string()),
            other => (message_id, Action::Persist, other.to_string()),
        };
        self.counters.lock().signals_routed += 1;
        self.push_failure(message_id, action, cause);
    }

    #[must_use]
    pub fn failures(&self) -> Vec<FailureReport> {
        self.failures.lock().iter().cloned().collect()
    }

    #[must_use]
    pub fn recent_activity(&self) -> Vec<ActivityEntry> {
        self.activity.lock().iter().cloned().collect()
    }

    fn push_failure(&self, message_id: MessageId, action: Action, cause: String) {
        self.counters.lock().failures += 1;
        let mut failures = self.failures.lock();
        if failures.len() == RECENT_LIMIT {
            failures.pop_front();
        }
        failures.push_back(FailureReport {
            message_id,
            action,
            cause,
            at: Utc::now(),
        });
    }

    fn push_activity(&self, entry: ActivityEntry) {
        let mut activity = self.activity.lock();
        if activity.len() == RECENT_LIMIT {
            activity.pop_front();
        }
        activity.push_back(entry);
    }
}

fn tally(counters: &mut Counters, outcome: &Outcome) {
    match outcome {
        Outcome::Opened { .. } => counters.opened += 1,
        Outcome::Pending { .. } => {}
        Outcome::Modified { .. } => counters.modified += 1,
        Outcome::ProfitTaken { .. }
        | Outcome::Closed { .. }
        | Outcome::PartiallyClosed { .. } => counters.closed += 1,
        Outcome::Discarded { .. } => counters.discarded += 1,
        Outcome::Ignored { .. } => counters.ignored += 1,
        Outcome::Failed { .. } => {}
        Outcome::Compound { steps, .. } => {
            for step in steps {
                tally(counters, step);
            }
        }
    }
}
