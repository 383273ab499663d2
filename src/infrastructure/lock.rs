//! Single-instance guard.
//!
//! The lock file sits next to the state file as `<state>.lock` and records
//! the owner's pid and start time. A lock left by a dead process is never
//! taken over silently: the operator clears it with `signal-relay unlock`
//! after checking the broker for orphaned orders.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Held instance lock. Released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    owner: LockOwner,
}

/// `<state>.lock` for a state file path.
#[must_use]
pub fn lock_path(state_path: &Path) -> PathBuf {
    let mut name = state_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    state_path.with_file_name(name)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

fn read_owner(path: &Path) -> Option<LockOwner> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

impl InstanceLock {
    /// Take the lock for `state_path`.
    ///
    /// # Errors
    ///
    /// [`Error::LockContention`] when a live process holds the lock,
    /// [`Error::StaleLock`] when the recorded owner is gone, or an I/O error.
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let path = lock_path(state_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let owner = LockOwner {
            pid: std::process::id(),
            started_at: Utc::now(),
        };

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(serde_json::to_string(&owner)?.as_bytes())?;
                file.sync_all()?;
                info!(path = %path.display(), pid = owner.pid, "Instance lock acquired");
                Ok(Self { path, owner })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let pid = read_owner(&path).map_or(0, |existing| existing.pid);
                if pid != 0 && process_alive(pid) {
                    Err(Error::LockContention { pid, path })
                } else {
                    warn!(path = %path.display(), pid, "Found stale instance lock");
                    Err(Error::StaleLock { pid, path })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stale lock for `state_path`.
    ///
    /// Returns the pid recorded in the removed lock, `None` when there was no
    /// lock.
    ///
    /// # Errors
    ///
    /// [`Error::LockContention`] when the owner is still running.
    pub fn clear_stale(state_path: &Path) -> Result<Option<u32>> {
        let path = lock_path(state_path);
        if !path.exists() {
            return Ok(None);
        }
        let pid = read_owner(&path).map_or(0, |owner| owner.pid);
        if pid != 0 && process_alive(pid) {
            return Err(Error::LockContention { pid, path });
        }
        fs::remove_file(&path)?;
        info!(path = %path.display(), pid, "Stale instance lock removed");
        Ok(Some(pid))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn owner(&self) -> &LockOwner {
        &self.owner
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if read_owner(&self.path).is_some_and(|owner| owner == self.owner) {
            match fs::remove_file(&self.path) {
                Ok(()) => info!(path = %self.path.display(), "Instance lock released"),
                Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to release instance lock"),
            }
        }
    }
}
