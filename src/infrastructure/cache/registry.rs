//! Registry owning one tiered cache per cache class

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::tiered::{TieredCache, TieredCacheConfig};
use crate::domain::cache::{Cache, CacheClass, CacheStats};
use crate::domain::DomainError;

/// Sizing for one cache class
#[derive(Debug, Clone, PartialEq)]
pub struct CacheClassConfig {
    /// Memory tier capacity in entries
    pub max_size: u64,
    /// TTL for entries set without one; `None` never expires
    pub default_ttl: Option<Duration>,
}

impl CacheClassConfig {
    pub fn new(max_size: u64, default_ttl: Option<Duration>) -> Self {
        Self {
            max_size,
            default_ttl,
        }
    }

    /// Built-in sizing for each class
    pub fn default_for(class: CacheClass) -> Self {
        const HOUR: u64 = 3600;
        const DAY: u64 = 24 * HOUR;

        match class {
            CacheClass::Llm => Self::new(1_000, Some(Duration::from_secs(7 * DAY))),
            CacheClass::Experiment => Self::new(500, Some(Duration::from_secs(30 * DAY))),
            CacheClass::Embedding => Self::new(5_000, Some(Duration::from_secs(30 * DAY))),
            CacheClass::General => Self::new(1_000, Some(Duration::from_secs(DAY))),
        }
    }
}

/// Configuration for the registry
#[derive(Debug, Clone)]
pub struct CacheRegistryConfig {
    /// Each class stores its disk tier under `<base_dir>/<class>`
    pub base_dir: PathBuf,
    pub classes: BTreeMap<CacheClass, CacheClassConfig>,
}

impl CacheRegistryConfig {
    /// Every class with its built-in sizing
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            classes: CacheClass::ALL
                .iter()
                .map(|class| (*class, CacheClassConfig::default_for(*class)))
                .collect(),
        }
    }

    /// Overrides one class's sizing
    pub fn with_class(mut self, class: CacheClass, config: CacheClassConfig) -> Self {
        self.classes.insert(class, config);
        self
    }

    /// Where a class keeps its entry files
    pub fn class_dir(&self, class: CacheClass) -> PathBuf {
        self.base_dir.join(class.as_str())
    }

    fn class_config(&self, class: CacheClass) -> CacheClassConfig {
        self.classes
            .get(&class)
            .cloned()
            .unwrap_or_else(|| CacheClassConfig::default_for(class))
    }
}

/// Per-class statistics plus totals
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryStats {
    pub classes: BTreeMap<String, CacheStats>,
    pub totals: CacheStats,
    /// Classes whose stats could not be collected
    pub errors: BTreeMap<String, String>,
}

impl RegistryStats {
    /// Overall hit ratio across every class
    pub fn hit_ratio(&self) -> f64 {
        self.totals.hit_ratio()
    }
}

/// Health of one class
#[derive(Debug, Clone, Serialize)]
pub struct ClassHealth {
    pub healthy: bool,
    pub detail: String,
}

/// Health of every class
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistryHealth {
    /// True only if every class is healthy
    pub healthy: bool,
    pub classes: BTreeMap<String, ClassHealth>,
}

/// Outcome of an expiry sweep across classes
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub purged: BTreeMap<String, usize>,
    pub errors: BTreeMap<String, String>,
}

impl CleanupReport {
    pub fn total_purged(&self) -> usize {
        self.purged.values().sum()
    }
}

/// Owns the tiered cache of every [`CacheClass`]
///
/// Classes never share keys or evict each other's entries. Every
/// aggregate operation reports each class independently, so a fault in one
/// class never hides the others.
#[derive(Debug)]
pub struct CacheRegistry {
    config: CacheRegistryConfig,
    llm: Arc<TieredCache>,
    experiment: Arc<TieredCache>,
    embedding: Arc<TieredCache>,
    general: Arc<TieredCache>,
}

impl CacheRegistry {
    /// Opens every class; fails only if a class directory cannot be created
    pub fn new(config: CacheRegistryConfig) -> Result<Self, DomainError> {
        let registry = Self {
            llm: Self::open_class(&config, CacheClass::Llm)?,
            experiment: Self::open_class(&config, CacheClass::Experiment)?,
            embedding: Self::open_class(&config, CacheClass::Embedding)?,
            general: Self::open_class(&config, CacheClass::General)?,
            config,
        };

        info!(base_dir = %registry.config.base_dir.display(), "Cache registry opened");
        Ok(registry)
    }

    fn open_class(
        config: &CacheRegistryConfig,
        class: CacheClass,
    ) -> Result<Arc<TieredCache>, DomainError> {
        let class_config = config.class_config(class);
        let mut tiered = TieredCacheConfig::new(class.as_str(), config.class_dir(class))
            .with_max_size(class_config.max_size);

        if let Some(ttl) = class_config.default_ttl {
            tiered = tiered.with_default_ttl(ttl);
        }

        Ok(Arc::new(TieredCache::new(tiered)?))
    }

    pub fn config(&self) -> &CacheRegistryConfig {
        &self.config
    }

    /// Handle to one class's cache
    pub fn get_cache(&self, class: CacheClass) -> Arc<TieredCache> {
        self.cache_ref(class).clone()
    }

    fn cache_ref(&self, class: CacheClass) -> &Arc<TieredCache> {
        match class {
            CacheClass::Llm => &self.llm,
            CacheClass::Experiment => &self.experiment,
            CacheClass::Embedding => &self.embedding,
            CacheClass::General => &self.general,
        }
    }

    fn classes(&self) -> impl Iterator<Item = (CacheClass, &Arc<TieredCache>)> {
        CacheClass::ALL
            .into_iter()
            .map(move |class| (class, self.cache_ref(class)))
    }

    /// Handle to a class's cache looked up by name
    pub fn get_cache_by_name(&self, name: &str) -> Result<Arc<TieredCache>, DomainError> {
        Ok(self.get_cache(name.parse()?))
    }

    pub async fn stats(&self) -> RegistryStats {
        let mut report = RegistryStats::default();

        for (class, cache) in self.classes() {
            match cache.stats().await {
                Ok(stats) => {
                    report.totals.merge(&stats);
                    report.classes.insert(class.to_string(), stats);
                }
                Err(e) => {
                    warn!(cache = %class, "Failed to collect cache stats: {}", e);
                    report.errors.insert(class.to_string(), e.to_string());
                }
            }
        }

        report
    }

    pub async fn health_check(&self) -> RegistryHealth {
        let mut classes = BTreeMap::new();

        for (class, cache) in self.classes() {
            let health = match cache.health_check().await {
                Ok(()) => ClassHealth {
                    healthy: true,
                    detail: "ok".to_string(),
                },
                Err(e) => ClassHealth {
                    healthy: false,
                    detail: e.to_string(),
                },
            };
            classes.insert(class.to_string(), health);
        }

        RegistryHealth {
            healthy: classes.values().all(|health| health.healthy),
            classes,
        }
    }

    pub async fn cleanup_expired(&self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for (class, cache) in self.classes() {
            match cache.cleanup_expired().await {
                Ok(purged) => {
                    report.purged.insert(class.to_string(), purged);
                }
                Err(e) => {
                    warn!(cache = %class, "Failed to sweep expired entries: {}", e);
                    report.errors.insert(class.to_string(), e.to_string());
                }
            }
        }

        info!(purged = report.total_purged(), "Expired cache entries swept");
        report
    }

    /// Empties every class, memory and disk; the teardown for test isolation
    pub async fn clear_all(&self) -> Result<(), DomainError> {
        let mut first_error = None;

        for (class, cache) in self.classes() {
            if let Err(e) = cache.clear().await {
                warn!(cache = %class, "Failed to clear cache: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
