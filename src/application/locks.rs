//! Per-message mutual exclusion.
//!
//! Every read-modify-write on a message, including timeout expiry, runs
//! under the lock for that message. Unrelated messages never contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::id::MessageId;

type LockMap = DashMap<MessageId, Arc<Mutex<()>>>;

/// Lazily created async mutexes keyed by message identifier.
#[derive(Default, Clone)]
pub struct KeyedLocks {
    locks: Arc<LockMap>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    pub async fn lock(&self, id: MessageId) -> KeyedGuard {
        let mutex = self.locks.entry(id).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            id,
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of live lock entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one message. Released on drop.
pub struct KeyedGuard {
    id: MessageId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map holds the mutex once no one waits on it.
        self.locks
            .remove_if(&self.id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
