//! Cache domain - Generic caching abstraction layer

mod class;
mod entry;
mod key;
mod repository;

pub use class::CacheClass;
pub use entry::{current_time_millis, duration_millis, CacheEntry, CacheStats};
pub use key::{hash_key, CacheKeyParams, KEY_LENGTH};
pub use repository::{Cache, CacheExt};
