//! Handler for the `unlock` command.

use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::lock::{lock_path, InstanceLock};

/// Remove a lock whose owner is no longer running.
///
/// # Errors
///
/// Fails when the owner is still alive or the file cannot be removed.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    let path = lock_path(&config.state.path);

    match InstanceLock::clear_stale(&config.state.path)? {
        Some(pid) => {
            output::success(&format!("Removed {} (pid {pid})", path.display()));
            output::warning("Check the broker for orders placed by the crashed instance.");
        }
        None => output::note(&format!("No lock at {}", path.display())),
    }
    Ok(())
}
