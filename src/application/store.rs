//! Position store: the in-memory [`BotState`] backed by a repository.
//!
//! Every mutation runs against a draft copy, the draft is persisted, and only
//! then does it replace the live state. A failed save leaves memory exactly as
//! it was.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info};

use crate::domain::id::{ChannelId, MessageId};
use crate::domain::lifecycle::Lifecycle;
use crate::domain::position::TrackedPosition;
use crate::domain::state::BotState;
use crate::error::Result;
use crate::port::outbound::store::StateRepository;

/// Shared, persisted view of every tracked position.
pub struct PositionStore {
    state: Mutex<BotState>,
    repository: Arc<dyn StateRepository>,
    /// Fully closed messages kept after pruning.
    max_closed: usize,
}

impl PositionStore {
    /// Load the stored state, or start empty when nothing was saved.
    pub fn open(repository: Arc<dyn StateRepository>, max_closed: usize) -> Result<Self> {
        let state = match repository.load()? {
            Some(state) => {
                info!(
                    location = %repository.location(),
                    open = state.open_count(),
                    pending = state.pending_count(),
                    "Loaded bot state"
                );
                state
            }
            None => {
                info!(location = %repository.location(), "No stored state, starting empty");
                BotState::default()
            }
        };
        Ok(Self {
            state: Mutex::new(state),
            repository,
            max_closed,
        })
    }

    /// Rows for a message.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Vec<TrackedPosition> {
        self.state.lock().legs(id).to_vec()
    }

    #[must_use]
    pub fn lifecycle(&self, id: MessageId) -> Lifecycle {
        self.state.lock().lifecycle(id)
    }

    /// Lifecycle of a message seen on `channel`, counting the channel horizon.
    #[must_use]
    pub fn lifecycle_on(&self, channel: &ChannelId, id: MessageId) -> Lifecycle {
        self.state.lock().lifecycle_on(channel, id)
    }

    /// Every row.
    #[must_use]
    pub fn all(&self) -> Vec<TrackedPosition> {
        self.state.lock().rows().cloned().collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> BotState {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn cursor(&self, channel: &ChannelId) -> Option<MessageId> {
        self.state.lock().cursors.get(channel).copied()
    }

    #[must_use]
    pub fn last_signal(&self, channel: &ChannelId) -> Option<MessageId> {
        self.state.lock().last_signals.get(channel).copied()
    }

    /// Whether the message has rows or reached a terminal state.
    #[must_use]
    pub fn knows(&self, channel: &ChannelId, id: MessageId) -> bool {
        self.state.lock().knows(channel, id)
    }

    pub fn upsert(&self, position: TrackedPosition) -> Result<()> {
        self.transact(|state| state.upsert(position))
    }

    pub fn remove(&self, id: MessageId) -> Result<Vec<TrackedPosition>> {
        self.transact(|state| state.remove(id))
    }

    /// Replace the whole state.
    pub fn restore(&self, restored: BotState) -> Result<()> {
        self.transact(|state| *state = restored)
    }

    pub fn advance_cursor(&self, channel: &ChannelId, id: MessageId) -> Result<()> {
        {
            let state = self.state.lock();
            if state.cursors.get(channel).is_some_and(|current| *current >= id) {
                return Ok(());
            }
        }
        self.transact(|state| {
            state.advance_cursor(channel, id);
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.transact(BotState::clear)?;
        info!("Bot state cleared");
        Ok(())
    }

    /// Apply `f` to a draft, persist it, then publish it.
    ///
    /// The lock is held for the whole call so writers are serialized and
    /// the persisted order matches the in-memory order. The save is blocking
    /// file I/O: readers wait for it, and on a multi-thread runtime it runs
    /// through [`tokio::task::block_in_place`] so the worker's other tasks
    /// move elsewhere meanwhile.
    pub fn transact<T>(&self, f: impl FnOnce(&mut BotState) -> T) -> Result<T> {
        let mut state = self.state.lock();
        let mut draft = state.clone();
        let value = f(&mut draft);
        let pruned = draft.prune(self.max_closed);
        if pruned > 0 {
            debug!(pruned, "Pruned closed records");
        }
        self.save(&draft)?;
        *state = draft;
        Ok(value)
    }

    fn save(&self, draft: &BotState) -> Result<()> {
        let multi_thread = Handle::try_current()
            .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        if multi_thread {
            tokio::task::block_in_place(|| self.repository.save(draft))
        } else {
            self.repository.save(draft)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{PositionStatus, Role};
    use crate::testkit::domain::open_leg;
    use crate::testkit::repository::MemoryRepository;

    fn store() -> (PositionStore, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        let store = PositionStore::open(repo.clone(), 20).unwrap();
        (store, repo)
    }

    #[test]
    fn upsert_persists_before_publishing() {
        let (store, repo) = store();
        store.upsert(open_leg(501, Role::Scalp, 1)).unwrap();

        assert_eq!(store.get(MessageId::new(501)).len(), 1);
        let saved = repo.stored().unwrap();
        assert!(saved.is_tracked(MessageId::new(501)));
        assert_eq!(repo.save_count(), 1);
    }

    #[test]
    fn failed_save_leaves_memory_unchanged() {
        let (store, repo) = store();
        store.upsert(open_leg(501, Role::Scalp, 1)).unwrap();

        repo.fail_saves(true);
        let err = store.transact(|state| {
            state.remove(MessageId::new(501));
        });
        assert!(err.is_err());
        assert_eq!(store.get(MessageId::new(501)).len(), 1);
        assert_eq!(store.lifecycle(MessageId::new(501)), Lifecycle::Open);
    }

    #[test]
    fn open_restores_saved_state() {
        let repo = Arc::new(MemoryRepository::new());
        {
            let store = PositionStore::open(repo.clone(), 20).unwrap();
            store.upsert(open_leg(7, Role::Single, 70)).unwrap();
        }
        let reopened = PositionStore::open(repo, 20).unwrap();
        let rows = reopened.get(MessageId::new(7));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, PositionStatus::Open);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn saves_from_worker_threads_stay_ordered() {
        let (store, repo) = store();
        let store = Arc::new(store);

        let writers: Vec<_> = (1..=8)
            .map(|id| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.upsert(open_leg(id, Role::Single, id as u64)) })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(repo.save_count(), 8);
        assert_eq!(repo.stored().unwrap(), store.snapshot());
        assert_eq!(store.all().len(), 8);
    }

    #[tokio::test]
    async fn saves_on_current_thread_runtime() {
        let (store, repo) = store();
        store.upsert(open_leg(1, Role::Single, 1)).unwrap();
        assert_eq!(repo.save_count(), 1);
    }

    #[test]
    fn advance_cursor_skips_save_when_not_moving() {
        let (store, repo) = store();
        let channel = ChannelId::new("c");
        store.advance_cursor(&channel, MessageId::new(10)).unwrap();
        store.advance_cursor(&channel, MessageId::new(5)).unwrap();

        assert_eq!(store.cursor(&channel), Some(MessageId::new(10)));
        assert_eq!(repo.save_count(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let (store, _) = store();
        store.upsert(open_leg(1, Role::Single, 1)).unwrap();
        store
            .advance_cursor(&ChannelId::new("c"), MessageId::new(1))
            .unwrap();
        store.clear().unwrap();

        assert!(store.all().is_empty());
        assert_eq!(store.cursor(&ChannelId::new("c")), None);
    }
}
