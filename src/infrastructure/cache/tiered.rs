//! Two-tier cache: bounded memory in front of durable disk

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::disk::{DiskCache, DiskCacheConfig};
use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use crate::domain::cache::{Cache, CacheStats};
use crate::domain::DomainError;

/// Configuration for both tiers
#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    pub memory: InMemoryCacheConfig,
    pub disk: DiskCacheConfig,
}

impl TieredCacheConfig {
    /// Both tiers share the name; the disk tier lives under `directory`
    pub fn new(name: impl Into<String>, directory: impl Into<std::path::PathBuf>) -> Self {
        let name = name.into();

        Self {
            memory: InMemoryCacheConfig::default().with_name(name.clone()),
            disk: DiskCacheConfig::new(directory).with_name(name),
        }
    }

    /// Sets the memory tier capacity
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.memory.max_size = max_size;
        self
    }

    /// Sets the default TTL on both tiers
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.memory.default_ttl = Some(ttl);
        self.disk.default_ttl = Some(ttl);
        self
    }
}

/// Per-tier breakdown of a tiered cache's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStats {
    pub memory: CacheStats,
    pub disk: CacheStats,
}

/// Read-through, write-through composition of [`InMemoryCache`] and [`DiskCache`]
///
/// The disk tier always holds a superset of the memory tier, so dropping
/// the memory tier never loses data.
#[derive(Debug)]
pub struct TieredCache {
    name: String,
    memory: InMemoryCache,
    disk: DiskCache,
}

impl TieredCache {
    pub fn new(config: TieredCacheConfig) -> Result<Self, DomainError> {
        let name = config.memory.name.clone();
        let disk = DiskCache::new(config.disk)?;

        Ok(Self {
            name,
            memory: InMemoryCache::with_config(config.memory),
            disk,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn memory(&self) -> &InMemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> &DiskCache {
        &self.disk
    }

    /// Drops the fast tier only; disk entries stay available
    pub async fn clear_memory(&self) -> Result<(), DomainError> {
        self.memory.clear().await
    }

    /// Counters for each tier separately
    pub async fn tier_stats(&self) -> Result<TierStats, DomainError> {
        Ok(TierStats {
            memory: self.memory.stats().await?,
            disk: self.disk.stats().await?,
        })
    }
}

#[async_trait]
impl Cache for TieredCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        if let Some(value) = self.memory.get_raw(key).await? {
            return Ok(Some(value));
        }

        let Some(entry) = self.disk.get_entry(key).await? else {
            return Ok(None);
        };

        debug!(cache = %self.name, "Promoting disk entry to memory");
        self.memory
            .set_raw(key, &entry.value, entry.ttl_remaining())
            .await?;

        Ok(Some(entry.value))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        self.memory.set_raw(key, value, ttl).await?;
        self.disk.set_raw(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let in_memory = self.memory.delete(key).await?;
        let on_disk = self.disk.delete(key).await?;

        Ok(in_memory || on_disk)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.memory.clear().await?;
        self.disk.clear().await
    }

    /// Hits from either tier; misses are lookups neither tier could serve
    async fn stats(&self) -> Result<CacheStats, DomainError> {
        let tiers = self.tier_stats().await?;

        Ok(CacheStats {
            hits: tiers.memory.hits + tiers.disk.hits,
            misses: tiers.disk.misses,
            entry_count: tiers.disk.entry_count,
            size_bytes: tiers.disk.size_bytes,
            evictions: tiers.memory.evictions,
        })
    }

    async fn cleanup_expired(&self) -> Result<usize, DomainError> {
        let from_memory = self.memory.cleanup_expired().await?;
        let from_disk = self.disk.cleanup_expired().await?;

        if from_memory > 0 || from_disk > 0 {
            debug!(cache = %self.name, from_memory, from_disk, "Purged expired entries");
        }

        // Memory entries are copies of disk entries, so disk is the purge count
        Ok(from_disk)
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        self.memory.health_check().await?;

        if let Err(e) = self.disk.health_check().await {
            warn!(cache = %self.name, "Disk tier unhealthy: {}", e);
            return Err(e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> TieredCache {
        TieredCache::new(TieredCacheConfig::new("test", dir.path()).with_max_size(100)).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key1", &"value1", None).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediate_miss() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("stale", &"value", Some(Duration::ZERO)).await.unwrap();

        let result: Option<String> = cache.get("stale").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_clearing_memory_keeps_data_on_disk() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key", &"value", None).await.unwrap();
        cache.clear_memory().await.unwrap();
        assert!(cache.memory().is_empty().await);

        let result: Option<String> = cache.get("key").await.unwrap();
        assert_eq!(result, Some("value".to_string()));

        let tiers = cache.tier_stats().await.unwrap();
        assert_eq!(tiers.disk.hits, 1);
        assert_eq!(tiers.memory.hits, 0);
    }

    #[tokio::test]
    async fn test_disk_hit_is_promoted_to_memory() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key", &"value", None).await.unwrap();
        cache.clear_memory().await.unwrap();

        let _: Option<String> = cache.get("key").await.unwrap();
        let _: Option<String> = cache.get("key").await.unwrap();
        let _: Option<String> = cache.get("key").await.unwrap();

        let tiers = cache.tier_stats().await.unwrap();
        assert_eq!(tiers.disk.hits, 1);
        assert_eq!(tiers.memory.hits, 2);

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_promotion_keeps_remaining_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache
            .set("key", &"value", Some(Duration::from_millis(150)))
            .await
            .unwrap();
        cache.clear_memory().await.unwrap();

        let promoted: Option<String> = cache.get("key").await.unwrap();
        assert!(promoted.is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;

        let expired: Option<String> = cache.get("key").await.unwrap();
        assert!(expired.is_none());
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let dir = TempDir::new().unwrap();

        {
            let cache = open(&dir);
            cache.set("key", &42, None).await.unwrap();
        }

        let reopened = open(&dir);
        let result: Option<i32> = reopened.get("key").await.unwrap();
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_delete_removes_from_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key", &"value", None).await.unwrap();
        assert!(cache.delete("key").await.unwrap());
        cache.clear_memory().await.unwrap();

        let result: Option<String> = cache.get("key").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_miss_counts_once() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        let _: Option<String> = cache.get("missing").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }

    #[tokio::test]
    async fn test_stats_keep_memory_counters_when_disk_is_unlistable() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key", &"value", None).await.unwrap();
        let _: Option<String> = cache.get("key").await.unwrap();

        std::fs::remove_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path(), b"not a directory").unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 0);
        assert!(cache.health_check().await.is_err());

        std::fs::remove_file(dir.path()).unwrap();
    }

    #[tokio::test]
    async fn test_memory_eviction_falls_back_to_disk() {
        let dir = TempDir::new().unwrap();
        let cache =
            TieredCache::new(TieredCacheConfig::new("small", dir.path()).with_max_size(2)).unwrap();

        for i in 0..5 {
            cache.set(&format!("key{}", i), &i, None).await.unwrap();
        }

        let first: Option<i32> = cache.get("key0").await.unwrap();
        assert_eq!(first, Some(0));
        assert!(cache.stats().await.unwrap().evictions >= 3);
    }
}
