//! Durable on-disk cache, one JSON file per entry

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::cache::{hash_key, Cache, CacheEntry, CacheStats};
use crate::domain::DomainError;
use crate::infrastructure::observability::record_cache_lookup;

const ENTRY_EXTENSION: &str = "json";

/// Configuration for the disk cache
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Name used in logs and metric labels
    pub name: String,
    /// Directory holding the entry files; created if missing
    pub directory: PathBuf,
    /// TTL for entries set without one; `None` never expires
    pub default_ttl: Option<Duration>,
}

impl DiskCacheConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            name: "disk".to_string(),
            directory: directory.into(),
            default_ttl: None,
        }
    }

    /// Sets the name used in logs and metrics
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the default TTL
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }
}

/// What was found at an entry path
enum Loaded {
    Missing,
    Corrupt,
    Expired,
    Live(CacheEntry),
}

/// Key-value store persisted under a directory
///
/// File names are the SHA-256 of the key, so any instance opened on the
/// same directory sees the same logical mapping. Writes land in a
/// temporary sibling and are renamed into place, so readers never see a
/// half-written entry and the last writer wins.
///
/// Failures on individual operations are logged and degrade to a miss or
/// a no-op; `health_check` is how callers learn the directory is broken.
#[derive(Debug)]
pub struct DiskCache {
    config: DiskCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DiskCache {
    /// Opens (and if needed creates) the cache directory
    pub fn new(config: DiskCacheConfig) -> Result<Self, DomainError> {
        std::fs::create_dir_all(&config.directory).map_err(|e| {
            DomainError::configuration(format!(
                "Cannot create cache directory {}: {}",
                config.directory.display(),
                e
            ))
        })?;

        if !config.directory.is_dir() {
            return Err(DomainError::configuration(format!(
                "Cache path {} is not a directory",
                config.directory.display()
            )));
        }

        Ok(Self {
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// The directory holding the entry files
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Reads the full entry for a key, counting the lookup
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>, DomainError> {
        let path = self.entry_path(key);

        let entry = match self.load(&path, Some(key)).await {
            Loaded::Live(entry) => Some(entry),
            Loaded::Missing => None,
            Loaded::Corrupt | Loaded::Expired => {
                self.remove_file(&path).await;
                None
            }
        };

        let hit = entry.is_some();
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        record_cache_lookup(&self.config.name, "disk", hit);

        Ok(entry)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.config
            .directory
            .join(format!("{}.{}", hash_key(key), ENTRY_EXTENSION))
    }

    fn is_entry_file(path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
    }

    async fn load(&self, path: &Path, expected_key: Option<&str>) -> Loaded {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Loaded::Missing,
            Err(e) => {
                warn!(cache = %self.config.name, path = %path.display(), "Failed to read cache entry: {}", e);
                return Loaded::Missing;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache = %self.config.name, path = %path.display(), "Discarding corrupted cache entry: {}", e);
                return Loaded::Corrupt;
            }
        };

        if expected_key.is_some_and(|key| key != entry.key) {
            warn!(cache = %self.config.name, path = %path.display(), "Discarding cache entry stored under a different key");
            return Loaded::Corrupt;
        }

        if entry.is_expired() {
            return Loaded::Expired;
        }

        Loaded::Live(entry)
    }

    async fn remove_file(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(cache = %self.config.name, path = %path.display(), "Failed to remove cache entry: {}", e);
                false
            }
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let tmp = self
            .config
            .directory
            .join(format!(".{}.tmp", Uuid::new_v4().simple()));

        if let Err(e) = fs::write(&tmp, contents).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        Ok(())
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, DomainError> {
        let mut dir = fs::read_dir(&self.config.directory).await.map_err(|e| {
            DomainError::storage(format!(
                "Cannot list cache directory {}: {}",
                self.config.directory.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| DomainError::storage(format!("Cannot list cache directory: {}", e)))?
        {
            let path = item.path();
            if Self::is_entry_file(&path) {
                files.push(path);
            }
        }

        Ok(files)
    }

    /// [`DiskCache::entry_files`], treating an unlistable directory as empty
    async fn entry_files_or_empty(&self) -> Vec<PathBuf> {
        match self.entry_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(cache = %self.config.name, "{}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.get_entry(key).await?.map(|entry| entry.value))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let entry = CacheEntry::new(key, value, ttl.or(self.config.default_ttl));
        let contents = serde_json::to_vec(&entry)
            .map_err(|e| DomainError::serialization(format!("Failed to encode cache entry: {}", e)))?;

        if let Err(e) = self.write_atomic(&self.entry_path(key), &contents).await {
            warn!(cache = %self.config.name, "Failed to write cache entry: {}", e);
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.remove_file(&self.entry_path(key)).await)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        for path in self.entry_files_or_empty().await {
            self.remove_file(&path).await;
        }

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, DomainError> {
        let files = self.entry_files_or_empty().await;
        let mut size_bytes = 0;

        for path in &files {
            if let Ok(metadata) = fs::metadata(path).await {
                size_bytes += metadata.len();
            }
        }

        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: files.len() as u64,
            size_bytes,
            evictions: 0,
        })
    }

    async fn cleanup_expired(&self) -> Result<usize, DomainError> {
        let mut purged = 0;

        for path in self.entry_files().await? {
            match self.load(&path, None).await {
                Loaded::Expired | Loaded::Corrupt => {
                    if self.remove_file(&path).await {
                        purged += 1;
                    }
                }
                Loaded::Live(_) | Loaded::Missing => {}
            }
        }

        debug!(cache = %self.config.name, purged, "Disk cache sweep finished");
        Ok(purged)
    }

    async fn health_check(&self) -> Result<(), DomainError> {
        let marker = self
            .config
            .directory
            .join(format!(".health-{}", Uuid::new_v4().simple()));
        let unhealthy = |e: std::io::Error| {
            DomainError::storage(format!(
                "Cache directory {} is not usable: {}",
                self.config.directory.display(),
                e
            ))
        };

        fs::write(&marker, b"ok").await.map_err(unhealthy)?;
        let read_back = fs::read(&marker).await.map_err(unhealthy);
        let _ = fs::remove_file(&marker).await;

        if read_back? != b"ok" {
            return Err(DomainError::storage("Cache health check read back wrong data"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> DiskCache {
        DiskCache::new(DiskCacheConfig::new(dir.path())).unwrap()
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
    async fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let first = open(&dir);
            first.set("persisted", &vec![1, 2, 3], None).await.unwrap();
        }

        let second = open(&dir);
        let result: Option<Vec<i32>> = second.get("persisted").await.unwrap();
        assert_eq!(result, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_file_names_are_derived_from_key() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key1", &"value1", None).await.unwrap();

        let expected = dir.path().join(format!("{}.json", hash_key("key1")));
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_immediate_miss() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("stale", &"value", Some(Duration::ZERO)).await.unwrap();

        let result: Option<String> = cache.get("stale").await.unwrap();
        assert!(result.is_none());

        // The expired file is removed lazily on access
        assert_eq!(cache.stats().await.unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_files() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("live", &"v", None).await.unwrap();
        cache.set("dead1", &"v", Some(Duration::ZERO)).await.unwrap();
        cache.set("dead2", &"v", Some(Duration::ZERO)).await.unwrap();

        assert_eq!(cache.cleanup_expired().await.unwrap(), 2);
        assert_eq!(cache.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_a_miss_and_removed() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        let path = dir.path().join(format!("{}.json", hash_key("broken")));
        std::fs::write(&path, b"{\"key\": \"broken\", \"val").unwrap();

        let result: Option<String> = cache.get("broken").await.unwrap();
        assert!(result.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("a", &1, None).await.unwrap();
        cache.set("b", &2, None).await.unwrap();
        cache.set("c", &3, None).await.unwrap();

        assert!(cache.delete("a").await.unwrap());
        assert!(!cache.delete("a").await.unwrap());

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().entry_count, 0);
    }

    #[tokio::test]
    async fn test_set_replaces_previous_value() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key", &"old", None).await.unwrap();
        cache.set("key", &"new", None).await.unwrap();

        let result: Option<String> = cache.get("key").await.unwrap();
        assert_eq!(result, Some("new".to_string()));
        assert_eq!(cache.stats().await.unwrap().entry_count, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        cache.set("key", &"value", None).await.unwrap();
        let _: Option<String> = cache.get("key").await.unwrap();
        let _: Option<String> = cache.get("missing").await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!(stats.size_bytes > 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);

        assert!(cache.health_check().await.is_ok());

        std::fs::remove_dir_all(dir.path()).unwrap();
        std::fs::write(dir.path(), b"not a directory").unwrap();

        assert!(cache.health_check().await.is_err());

        // Operations degrade instead of failing
        cache.set("key", &"value", None).await.unwrap();
        let result: Option<String> = cache.get("key").await.unwrap();
        assert!(result.is_none());

        cache.clear().await.unwrap();
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.size_bytes, 0);

        std::fs::remove_file(dir.path()).unwrap();
    }

    #[test]
    fn test_unusable_directory_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let result = DiskCache::new(DiskCacheConfig::new(file.join("nested")));
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }
}
