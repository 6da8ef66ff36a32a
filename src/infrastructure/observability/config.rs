//! Observability configuration

use serde::Deserialize;

/// Prometheus metrics configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    /// Install a Prometheus recorder; counters are no-ops otherwise
    #[serde(default)]
    pub enabled: bool,
}
