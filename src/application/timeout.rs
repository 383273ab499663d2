//! Completion timeouts for incomplete signals.
//!
//! One timer per pending message. Each armed timer gets a fresh generation;
//! the expiry path must confirm its generation is still current (under the
//! message lock) before acting, so a cancelled or re-armed timer never fires
//! into a newer lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::domain::id::MessageId;

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Owns every pending completion timer.
pub struct TimeoutSupervisor {
    window: Duration,
    timers: Mutex<HashMap<MessageId, Timer>>,
    next_generation: AtomicU64,
}

impl TimeoutSupervisor {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timers: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Configured completion window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Arm (or re-arm) the timer for `id`. `on_expire` receives the
    /// generation assigned to this timer.
    pub fn arm<F, Fut>(&self, id: MessageId, deadline: Instant, on_expire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        // Registered before the task can observe it.
        let mut timers = self.timers.lock();
        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            on_expire(generation).await;
        });
        if let Some(previous) = timers.insert(id, Timer { generation, handle }) {
            previous.handle.abort();
        }
        drop(timers);
        debug!(message_id = %id, generation, "Completion timer armed");
        generation
    }

    /// Cancel the timer for `id`. Returns whether one was pending.
    pub fn cancel(&self, id: MessageId) -> bool {
        match self.timers.lock().remove(&id) {
            Some(timer) => {
                timer.handle.abort();
                debug!(message_id = %id, generation = timer.generation, "Completion timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether `generation` is the live timer for `id`.
    #[must_use]
    pub fn is_current(&self, id: MessageId, generation: u64) -> bool {
        self.timers
            .lock()
            .get(&id)
            .is_some_and(|timer| timer.generation == generation)
    }

    /// Forget a timer that has fired, without aborting the running task.
    pub fn retire(&self, id: MessageId, generation: u64) {
        let mut timers = self.timers.lock();
        if timers.get(&id).is_some_and(|t| t.generation == generation) {
            timers.remove(&id);
        }
    }

    /// Abort everything. Used on shutdown and clear.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Timer> = self.timers.lock().drain().map(|(_, t)| t).collect();
        for timer in &drained {
            timer.handle.abort();
        }
        drained.len()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
