//! In-memory [`StateRepository`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::domain::state::BotState;
use crate::error::{Error, Result};
use crate::port::outbound::store::StateRepository;

/// Keeps the last saved document in memory. Saves can be made to fail.
#[derive(Default)]
pub struct MemoryRepository {
    stored: Mutex<Option<BotState>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already saved document.
    pub fn with_state(state: BotState) -> Self {
        Self {
            stored: Mutex::new(Some(state)),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> Option<BotState> {
        self.stored.lock().clone()
    }

    /// Successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl StateRepository for MemoryRepository {
    fn load(&self) -> Result<Option<BotState>> {
        Ok(self.stored.lock().clone())
    }

    fn save(&self, state: &BotState) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Persistence("disk full".into()));
        }
        *self.stored.lock() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".into()
    }
}
