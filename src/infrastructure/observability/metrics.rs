//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use super::config::MetricsConfig;

/// Prometheus metrics handle for rendering the exposition text
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    /// Get the metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
///
/// Without an installed recorder every `record_*` call is a no-op.
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::debug!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("research_cache_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
            tracing::info!("Prometheus metrics initialized");

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Record a cache lookup against one tier
pub fn record_cache_lookup(cache: &str, tier: &'static str, hit: bool) {
    let labels = [
        ("cache", cache.to_string()),
        ("tier", tier.to_string()),
        ("outcome", if hit { "hit" } else { "miss" }.to_string()),
    ];

    counter!("cache_requests_total", &labels).increment(1);
}

/// Record a capacity eviction
pub fn record_cache_eviction(cache: &str) {
    counter!("cache_evictions_total", "cache" => cache.to_string()).increment(1);
}

/// Record a semantic cache lookup outcome (`exact`, `similar`, `miss`, `bypass`)
pub fn record_semantic_lookup(outcome: &'static str) {
    counter!("semantic_cache_lookups_total", "outcome" => outcome).increment(1);
}

/// Record a finished executor task
pub fn record_task(success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };

    counter!("executor_tasks_total", "status" => status).increment(1);
    histogram!("executor_task_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

/// Record the scheduler's latest recommendation
pub fn record_recommended_workers(workers: usize) {
    gauge!("scheduler_recommended_workers").set(workers as f64);
}
