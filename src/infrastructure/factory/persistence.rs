//! State repository and position store construction.

use std::sync::Arc;

use crate::adapter::outbound::json_store::JsonStateFile;
use crate::application::store::PositionStore;
use crate::error::Result;
use crate::infrastructure::config::state::StateConfig;
use crate::port::outbound::store::StateRepository;

#[must_use]
pub fn build_repository(config: &StateConfig) -> Arc<dyn StateRepository> {
    Arc::new(JsonStateFile::new(config.path.clone()))
}

/// Open the store from the configured state file.
///
/// # Errors
///
/// Returns an error if the state file exists but cannot be read.
pub fn open_store(config: &StateConfig) -> Result<Arc<PositionStore>> {
    let store = PositionStore::open(build_repository(config), config.max_closed_records)?;
    Ok(Arc::new(store))
}
