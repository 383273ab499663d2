//! Control surface over a running coordinator.

use async_trait::async_trait;

use super::status::{FailureReport, StatusSnapshot};
use crate::domain::position::TrackedPosition;
use crate::error::Result;

/// Operator use cases.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait Operator: Send + Sync {
    fn status(&self) -> StatusSnapshot;

    /// Every tracked row, open or not.
    fn positions(&self) -> Vec<TrackedPosition>;

    /// Recent transitions that failed.
    fn failures(&self) -> Vec<FailureReport>;

    /// Resume consuming chat events.
    fn start(&self);

    /// Stop consuming chat events. Timers keep running.
    fn stop(&self);

    /// Cancel all timers and wipe the stored state.
    async fn clear(&self) -> Result<()>;

    /// Ask the coordinator to exit.
    fn shutdown(&self);
}
