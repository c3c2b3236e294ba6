//! Host vs container selection.

use super::probe::ToolAvailability;
use serde::Serialize;

/// Where a bundling request is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BundlingStrategy {
    /// Run `cargo lambda` directly on this machine
    RunOnHost,
    /// Run `cargo lambda` inside the build container
    RunInContainer,
}

/// Picks the execution strategy for one request.
///
/// The container is used when it is forced or when the native tool is not
/// known to be available (`Unknown` counts as not available).
pub fn select_strategy(force_container: bool, availability: ToolAvailability) -> BundlingStrategy {
    if force_container || !availability.is_available() {
        BundlingStrategy::RunInContainer
    } else {
        BundlingStrategy::RunOnHost
    }
}
