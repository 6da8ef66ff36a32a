//! Host resource sampling port

use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Utilization snapshot, both values in percent (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// Source of live host telemetry
///
/// `sample` returns `None` when telemetry is unavailable; callers fall
/// back to static sizing.
#[cfg_attr(test, automock)]
pub trait ResourceSampler: Send + Sync {
    fn sample(&self) -> Option<ResourceUsage>;

    /// Whether this sampler reads live telemetry at all
    fn is_live(&self) -> bool {
        true
    }
}
