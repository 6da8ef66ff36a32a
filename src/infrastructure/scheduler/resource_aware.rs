//! Worker-count recommendations from host load

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sampler::default_sampler;
use crate::domain::scheduler::{ResourceSampler, ResourceUsage};
use crate::infrastructure::observability::record_recommended_workers;

/// Percentage points over a ceiling that cost one worker
const REDUCTION_STEP_PERCENT: f32 = 10.0;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Never recommend fewer workers than this
    pub min_workers: usize,
    /// CPU utilization ceiling in percent
    pub max_cpu_percent: f32,
    /// Memory utilization ceiling in percent
    pub max_memory_percent: f32,
    /// Overrides core detection
    pub cpu_cores: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_cpu_percent: 85.0,
            max_memory_percent: 85.0,
            cpu_cores: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_min_workers(mut self, min_workers: usize) -> Self {
        self.min_workers = min_workers;
        self
    }

    pub fn with_ceilings(mut self, max_cpu_percent: f32, max_memory_percent: f32) -> Self {
        self.max_cpu_percent = max_cpu_percent;
        self.max_memory_percent = max_memory_percent;
        self
    }

    pub fn with_cpu_cores(mut self, cores: usize) -> Self {
        self.cpu_cores = Some(cores);
        self
    }
}

/// Number of logical cores, or 1 if it cannot be determined
pub fn detect_cpu_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Sizes worker pools from core count and current host load
///
/// Reads telemetry only; safe to share and call from any thread.
pub struct ResourceAwareScheduler {
    config: SchedulerConfig,
    sampler: Box<dyn ResourceSampler>,
}

impl std::fmt::Debug for ResourceAwareScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAwareScheduler")
            .field("config", &self.config)
            .field("live_sampling", &self.sampler.is_live())
            .finish()
    }
}

impl ResourceAwareScheduler {
    /// Uses the platform's default sampler
    pub fn new(config: SchedulerConfig) -> Self {
        let sampler = default_sampler();
        info!(
            live_sampling = sampler.is_live(),
            min_workers = config.min_workers,
            "Resource-aware scheduler ready"
        );

        Self::with_sampler(config, sampler)
    }

    pub fn with_sampler(config: SchedulerConfig, sampler: Box<dyn ResourceSampler>) -> Self {
        Self { config, sampler }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cpu_cores(&self) -> usize {
        self.config.cpu_cores.unwrap_or_else(detect_cpu_cores).max(1)
    }

    /// One core left for the caller, never below `min_workers`
    pub fn baseline_workers(&self) -> usize {
        self.cpu_cores()
            .saturating_sub(1)
            .max(self.config.min_workers)
    }

    /// Current usage, if the sampler can provide it
    pub fn current_usage(&self) -> Option<ResourceUsage> {
        self.sampler.sample()
    }

    /// Baseline reduced by one worker per started 10 points over each ceiling
    pub fn recommended_workers(&self) -> usize {
        let baseline = self.baseline_workers();

        let Some(usage) = self.sampler.sample() else {
            debug!(baseline, "Resource sampling unavailable, using baseline");
            record_recommended_workers(baseline);
            return baseline;
        };

        let reduction = overage_reduction(usage.cpu_percent, self.config.max_cpu_percent)
            + overage_reduction(usage.memory_percent, self.config.max_memory_percent);
        let workers = baseline
            .saturating_sub(reduction)
            .max(self.config.min_workers);

        debug!(
            cpu_percent = usage.cpu_percent,
            memory_percent = usage.memory_percent,
            baseline,
            workers,
            "Recommended worker count"
        );
        record_recommended_workers(workers);

        workers
    }
}

fn overage_reduction(usage: f32, ceiling: f32) -> usize {
    if usage <= ceiling {
        return 0;
    }

    ((usage - ceiling) / REDUCTION_STEP_PERCENT).floor() as usize + 1
}
