//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    init_metrics, record_cache_eviction, record_cache_lookup, record_recommended_workers,
    record_semantic_lookup, record_task, PrometheusMetrics,
};
