//! Cache infrastructure - Store implementations and the class registry

mod disk;
mod in_memory;
mod registry;
mod tiered;

pub use disk::{DiskCache, DiskCacheConfig};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use registry::{
    CacheClassConfig, CacheRegistry, CacheRegistryConfig, ClassHealth, CleanupReport,
    RegistryHealth, RegistryStats,
};
pub use tiered::{TierStats, TieredCache, TieredCacheConfig};
