//! Bounded in-memory cache implementation using moka

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use tracing::trace;

use crate::domain::cache::{current_time_millis, duration_millis, Cache, CacheStats};
use crate::domain::DomainError;
use crate::infrastructure::observability::{record_cache_eviction, record_cache_lookup};

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Name used in logs and metric labels
    pub name: String,
    /// Maximum number of resident entries
    pub max_size: u64,
    /// TTL for entries set without one; `None` never expires
    pub default_ttl: Option<Duration>,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            max_size: 10_000,
            default_ttl: None,
        }
    }
}

impl InMemoryCacheConfig {
    /// Sets the name used in logs and metrics
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the maximum number of entries
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct MemoryEntry {
    /// Serialized JSON value
    data: String,
    /// Expiration timestamp (millis since epoch)
    expires_at: Option<u64>,
}

impl MemoryEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| current_time_millis() >= expires_at)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Fixed-capacity cache with least-recently-used eviction
///
/// Features:
/// - Strict LRU order, refreshed on both reads and writes
/// - Per-entry TTL, enforced lazily on access and by `cleanup_expired`
/// - Capacity is enforced before `set_raw` returns
/// - Concurrent access without external locking
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, MemoryEntry>,
    config: InMemoryCacheConfig,
    counters: Arc<Counters>,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let counters = Arc::new(Counters::default());
        let listener_counters = counters.clone();
        let name = config.name.clone();

        let cache = MokaCache::builder()
            .max_capacity(config.max_size)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |key: Arc<String>, _value, cause| {
                if cause == RemovalCause::Size {
                    listener_counters.evictions.fetch_add(1, Ordering::Relaxed);
                    record_cache_eviction(&name);
                    trace!(cache = %name, key = %key, "Evicted least recently used entry");
                }
            })
            .build();

        Self {
            cache,
            config,
            counters,
        }
    }

    /// The configuration this cache was built with
    pub fn config(&self) -> &InMemoryCacheConfig {
        &self.config
    }

    /// Number of resident entries, including expired ones not yet purged
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Whether no entries are resident
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn record(&self, hit: bool) {
        let counter = if hit {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        record_cache_lookup(&self.config.name, "memory", hit);
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        match self.cache.get(key).await {
            Some(entry) if entry.is_expired() => {
                self.cache.invalidate(key).await;
                self.record(false);
                Ok(None)
            }
            Some(entry) => {
                self.record(true);
                Ok(Some(entry.data))
            }
            None => {
                self.record(false);
                Ok(None)
            }
        }
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let expires_at = ttl
            .or(self.config.default_ttl)
            .map(|ttl| current_time_millis().saturating_add(duration_millis(ttl)));
        let entry = MemoryEntry {
            data: value.to_string(),
            expires_at,
        };

        self.cache.insert(key.to_string(), entry).await;
        // Apply pending reads and evictions now so residency never exceeds max_size
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, DomainError> {
        self.cache.run_pending_tasks().await;

        let size_bytes: u64 = self
            .cache
            .iter()
            .map(|(key, entry)| (key.len() + entry.data.len()) as u64)
            .sum();

        Ok(CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count(),
            size_bytes,
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        })
    }

    async fn cleanup_expired(&self) -> Result<usize, DomainError> {
        let expired: Vec<Arc<String>> = self
            .cache
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.cache.invalidate(key.as_str()).await;
        }

        self.cache.run_pending_tasks().await;
        Ok(expired.len())
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    fn bounded(max_size: u64) -> InMemoryCache {
        InMemoryCache::with_config(InMemoryCacheConfig::default().with_max_size(max_size))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"value1", None).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediate_miss() {
        let cache = InMemoryCache::new();

        cache.set("stale", &"value", Some(Duration::ZERO)).await.unwrap();

        let result: Option<String> = cache.get("stale").await.unwrap();
        assert!(result.is_none());

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_wrap_into_the_past() {
        let cache = InMemoryCache::new();

        cache.set("forever", &"value", Some(Duration::MAX)).await.unwrap();

        let result: Option<String> = cache.get("forever").await.unwrap();
        assert_eq!(result, Some("value".to_string()));
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.exists("key1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"old", None).await.unwrap();
        cache.set("key1", &"new", None).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("new".to_string()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"value1", None).await.unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_capacity_is_never_exceeded() {
        let cache = bounded(5);

        for i in 0..20 {
            cache.set(&format!("key{}", i), &i, None).await.unwrap();
            assert!(cache.len().await <= 5);
        }

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entry_count, 5);
        assert_eq!(stats.evictions, 15);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted_first() {
        let cache = bounded(3);

        cache.set("a", &1, None).await.unwrap();
        cache.set("b", &2, None).await.unwrap();
        cache.set("c", &3, None).await.unwrap();

        // Touch "a" so "b" becomes the least recently used
        let touched: Option<i32> = cache.get("a").await.unwrap();
        assert_eq!(touched, Some(1));

        cache.set("d", &4, None).await.unwrap();

        assert!(cache.exists("a").await.unwrap());
        assert!(!cache.exists("b").await.unwrap());
        assert!(cache.exists("c").await.unwrap());
        assert!(cache.exists("d").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"value1", None).await.unwrap();
        cache.set("key2", &"value2", None).await.unwrap();

        cache.clear().await.unwrap();

        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = InMemoryCache::new();

        cache.set("live", &"v", None).await.unwrap();
        cache.set("dead1", &"v", Some(Duration::ZERO)).await.unwrap();
        cache.set("dead2", &"v", Some(Duration::ZERO)).await.unwrap();

        assert_eq!(cache.cleanup_expired().await.unwrap(), 2);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_default_ttl_applies_when_unset() {
        let config = InMemoryCacheConfig::default().with_default_ttl(Duration::ZERO);
        let cache = InMemoryCache::with_config(config);

        cache.set("key", &"v", None).await.unwrap();

        let result: Option<String> = cache.get("key").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_stats_counts_hits_and_misses() {
        let cache = InMemoryCache::new();

        cache.set("key", &"value", None).await.unwrap();
        let _: Option<String> = cache.get("key").await.unwrap();
        let _: Option<String> = cache.get("key").await.unwrap();
        let _: Option<String> = cache.get("other").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.size_bytes, ("key".len() + "\"value\"".len()) as u64);
        assert!((stats.hit_ratio() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_complex_types() {
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct TestData {
            name: String,
            values: Vec<i32>,
        }

        let cache = InMemoryCache::new();
        let data = TestData {
            name: "test".to_string(),
            values: vec![1, 2, 3],
        };

        cache.set("complex", &data, None).await.unwrap();

        let result: Option<TestData> = cache.get("complex").await.unwrap();
        assert_eq!(result, Some(data));
    }
}
