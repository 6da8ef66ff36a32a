//! Task runner decorator that reuses earlier experiment outcomes

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::cache::{CacheExt, CacheKeyParams};
use crate::domain::task::{ExperimentOutcome, ExperimentTask, TaskRunner};
use crate::domain::DomainError;
use crate::infrastructure::cache::TieredCache;

/// Serves a task from cache when an identical experiment already succeeded
///
/// Identity is payload, data reference and config; id and priority do not
/// matter. Failed outcomes are never stored.
pub struct CachedTaskRunner {
    inner: Arc<dyn TaskRunner>,
    cache: Arc<TieredCache>,
}

impl CachedTaskRunner {
    pub fn new(inner: Arc<dyn TaskRunner>, cache: Arc<TieredCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache_key(task: &ExperimentTask) -> String {
        CacheKeyParams::new(task.payload())
            .with_component("data_reference", task.data_reference())
            .with_component("config", serde_json::json!(task.config()))
            .derive()
    }
}

#[async_trait]
impl TaskRunner for CachedTaskRunner {
    async fn run(&self, task: &ExperimentTask) -> Result<ExperimentOutcome, DomainError> {
        let key = Self::cache_key(task);

        match self.cache.get::<ExperimentOutcome>(&key).await {
            Ok(Some(outcome)) => {
                debug!(task_id = %task.id(), "Experiment served from cache");
                return Ok(outcome);
            }
            Ok(None) => {}
            Err(e) => warn!(task_id = %task.id(), "Experiment cache lookup failed: {}", e),
        }

        let outcome = self.inner.run(task).await?;

        if outcome.success {
            if let Err(e) = self.cache.set(&key, &outcome, None).await {
                warn!(task_id = %task.id(), "Failed to cache experiment outcome: {}", e);
            }
        }

        Ok(outcome)
    }
}
