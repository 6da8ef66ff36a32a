//! Resource-aware worker scheduling

mod resource_aware;
mod sampler;

pub use resource_aware::{detect_cpu_cores, ResourceAwareScheduler, SchedulerConfig};
pub use sampler::{default_sampler, StaticResourceSampler, SystemResourceSampler};
