use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::cache::CacheClass;
use crate::domain::semantic_cache::SemanticCacheConfig;
use crate::infrastructure::cache::{CacheClassConfig, CacheRegistryConfig};
use crate::infrastructure::executor::ExecutorConfig;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::scheduler::SchedulerConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub cache: CacheConfig,
    pub semantic_cache: SemanticCacheConfig,
    pub scheduler: SchedulerConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Cache registry section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub base_dir: PathBuf,
    /// Overrides on top of each class's built-in sizing
    pub classes: BTreeMap<CacheClass, CacheClassOverride>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheClassOverride {
    pub max_size: Option<u64>,
    /// `0` disables the default TTL
    pub default_ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".research-cache"),
            classes: BTreeMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn registry_config(&self) -> CacheRegistryConfig {
        let mut registry = CacheRegistryConfig::new(self.base_dir.clone());

        for (class, overrides) in &self.classes {
            let mut config = CacheClassConfig::default_for(*class);

            if let Some(max_size) = overrides.max_size {
                config.max_size = max_size;
            }
            match overrides.default_ttl_secs {
                Some(0) => config.default_ttl = None,
                Some(secs) => config.default_ttl = Some(Duration::from_secs(secs)),
                None => {}
            }

            registry = registry.with_class(*class, config);
        }

        registry
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("RESEARCH_CACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.logging.level, "info");
        assert!(!config.metrics.enabled);
        assert_eq!(config.cache.base_dir, PathBuf::from(".research-cache"));
        assert_eq!(config.scheduler.min_workers, 1);
        assert!(config.semantic_cache.enabled);
        assert!(config.executor.max_workers.is_none());
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "logging": { "format": "json" },
            "scheduler": { "max_cpu_percent": 70.0 },
            "executor": { "max_workers": 3, "task_timeout_secs": 60 },
            "cache": {
                "base_dir": "/var/cache/research",
                "classes": { "llm": { "max_size": 50 } }
            }
        }))
        .unwrap();

        assert!(matches!(config.logging.format, LogFormat::Json));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scheduler.max_cpu_percent, 70.0);
        assert_eq!(config.scheduler.max_memory_percent, 85.0);
        assert_eq!(config.executor.task_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.cache.classes[&CacheClass::Llm].max_size, Some(50));
    }

    #[test]
    fn test_class_overrides_reach_registry_config() {
        let mut cache = CacheConfig {
            base_dir: PathBuf::from("/tmp/rc"),
            ..Default::default()
        };
        cache.classes.insert(
            CacheClass::Llm,
            CacheClassOverride {
                max_size: Some(10),
                default_ttl_secs: Some(0),
            },
        );
        cache.classes.insert(
            CacheClass::General,
            CacheClassOverride {
                max_size: None,
                default_ttl_secs: Some(60),
            },
        );

        let registry = cache.registry_config();

        let llm = &registry.classes[&CacheClass::Llm];
        assert_eq!(llm.max_size, 10);
        assert_eq!(llm.default_ttl, None);

        let general = &registry.classes[&CacheClass::General];
        assert_eq!(general.max_size, 1_000);
        assert_eq!(general.default_ttl, Some(Duration::from_secs(60)));

        assert_eq!(
            registry.classes[&CacheClass::Experiment],
            CacheClassConfig::default_for(CacheClass::Experiment)
        );
    }
}
