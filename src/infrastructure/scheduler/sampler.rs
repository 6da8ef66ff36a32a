//! Resource sampler implementations

use std::sync::{Mutex, PoisonError};

use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tracing::debug;

use crate::domain::scheduler::{ResourceSampler, ResourceUsage};

/// Live CPU and memory telemetry through `sysinfo`
///
/// CPU usage is measured between consecutive refreshes, so the first
/// sample after construction reflects the interval since `new`.
#[derive(Debug)]
pub struct SystemResourceSampler {
    system: Mutex<System>,
}

impl SystemResourceSampler {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SystemResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for SystemResourceSampler {
    fn sample(&self) -> Option<ResourceUsage> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_cpu();
        system.refresh_memory();

        let total_memory = system.total_memory();
        if total_memory == 0 {
            return None;
        }

        Some(ResourceUsage {
            cpu_percent: system.global_cpu_info().cpu_usage(),
            memory_percent: (system.used_memory() as f64 / total_memory as f64 * 100.0) as f32,
        })
    }
}

/// Fallback for platforms without telemetry; never samples
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticResourceSampler;

impl ResourceSampler for StaticResourceSampler {
    fn sample(&self) -> Option<ResourceUsage> {
        None
    }

    fn is_live(&self) -> bool {
        false
    }
}

/// Live sampler where `sysinfo` supports the platform, static otherwise
pub fn default_sampler() -> Box<dyn ResourceSampler> {
    if sysinfo::IS_SUPPORTED_SYSTEM {
        Box::new(SystemResourceSampler::new())
    } else {
        debug!("Resource sampling unsupported on this platform, using static sizing");
        Box::new(StaticResourceSampler)
    }
}
