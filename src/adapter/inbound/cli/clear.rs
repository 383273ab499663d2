//! Handler for the `clear` command.

use std::path::Path;

use crate::adapter::inbound::cli::output;
use crate::domain::state::BotState;
use crate::error::{Error, Result};
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::factory::persistence;
use crate::infrastructure::lock::InstanceLock;

/// Wipe the stored state.
///
/// Takes the instance lock for the duration so a running relay is never
/// cleared underneath.
///
/// # Errors
///
/// [`Error::Unconfirmed`] without `--yes`, lock errors while an instance
/// runs or a stale lock exists, or persistence failures.
pub fn execute(config_path: &Path, confirmed: bool) -> Result<()> {
    if !confirmed {
        return Err(Error::Unconfirmed(
            "clearing forgets every tracked broker position",
        ));
    }

    let config = Config::load(config_path)?;
    let _lock = InstanceLock::acquire(&config.state.path)?;
    let repository = persistence::build_repository(&config.state);
    let previous = repository.load()?.unwrap_or_default();
    repository.save(&BotState::default())?;

    output::success(&format!(
        "Cleared {} tracked rows from {}",
        previous.rows().count(),
        repository.location()
    ));
    Ok(())
}
