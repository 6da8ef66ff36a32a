//! Semantic request cache over the llm cache class

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::similarity::NoopSimilarityIndex;
use crate::domain::cache::{Cache, CacheExt, CacheKeyParams};
use crate::domain::semantic_cache::{
    normalize_text, CacheHit, CacheRequest, HitType, SemanticCacheConfig, SimilarityIndex,
};
use crate::domain::DomainError;
use crate::infrastructure::cache::TieredCache;
use crate::infrastructure::observability::record_semantic_lookup;

/// Lookup and store counters for a [`SemanticRequestCache`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticCacheStats {
    pub exact_hits: u64,
    pub similar_hits: u64,
    pub misses: u64,
    pub bypassed: u64,
    pub stores: u64,
}

impl SemanticCacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.exact_hits + self.similar_hits;
        let total = hits + self.misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    exact_hits: AtomicU64,
    similar_hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
    stores: AtomicU64,
}

/// Caches model responses keyed by normalized request
///
/// Requests matching a bypass pattern never reach the underlying cache.
/// On an exact miss the similarity index is consulted when enabled.
#[derive(Debug)]
pub struct SemanticRequestCache {
    cache: Arc<TieredCache>,
    index: Arc<dyn SimilarityIndex>,
    config: SemanticCacheConfig,
    bypass: Vec<Regex>,
    counters: Counters,
}

impl SemanticRequestCache {
    /// Fails if a bypass pattern is not a valid regex
    pub fn new(cache: Arc<TieredCache>, config: SemanticCacheConfig) -> Result<Self, DomainError> {
        let bypass = config
            .bypass_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        DomainError::configuration(format!(
                            "Invalid bypass pattern '{}': {}",
                            pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            cache,
            index: Arc::new(NoopSimilarityIndex),
            config,
            bypass,
            counters: Counters::default(),
        })
    }

    pub fn with_similarity_index(mut self, index: Arc<dyn SimilarityIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn config(&self) -> &SemanticCacheConfig {
        &self.config
    }

    /// Whether the raw prompt matches any bypass pattern
    pub fn should_bypass(&self, prompt: &str) -> bool {
        self.bypass.iter().any(|pattern| pattern.is_match(prompt))
    }

    pub fn cache_key(&self, request: &CacheRequest) -> String {
        request.cache_key()
    }

    /// Exact lookup, then similarity fallback
    pub async fn get<V>(&self, request: &CacheRequest) -> Result<Option<CacheHit<V>>, DomainError>
    where
        V: DeserializeOwned + Send,
    {
        if !self.config.enabled {
            return Ok(None);
        }

        if self.should_bypass(&request.prompt) {
            self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
            record_semantic_lookup("bypass");
            debug!(model = %request.model, "Request bypasses the semantic cache");
            return Ok(None);
        }

        let key = request.cache_key();

        if let Some(value) = self.cache.get::<V>(&key).await? {
            self.counters.exact_hits.fetch_add(1, Ordering::Relaxed);
            record_semantic_lookup("exact");
            debug!(key = %key, "Semantic cache exact hit");

            return Ok(Some(CacheHit {
                value,
                hit_type: HitType::Exact,
                similarity: 1.0,
                key,
            }));
        }

        if self.config.similarity_enabled {
            if let Some(hit) = self.find_similar(request).await? {
                return Ok(Some(hit));
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        record_semantic_lookup("miss");

        Ok(None)
    }

    async fn find_similar<V>(&self, request: &CacheRequest) -> Result<Option<CacheHit<V>>, DomainError>
    where
        V: DeserializeOwned + Send,
    {
        let text = normalize_text(&request.prompt);
        let Some(candidate) = self
            .index
            .find_similar(&scope(request), &text, self.config.similarity_threshold)
            .await
        else {
            return Ok(None);
        };

        match self.cache.get::<V>(&candidate.key).await? {
            Some(value) => {
                self.counters.similar_hits.fetch_add(1, Ordering::Relaxed);
                record_semantic_lookup("similar");
                debug!(
                    key = %candidate.key,
                    similarity = candidate.similarity,
                    "Semantic cache similar hit"
                );

                Ok(Some(CacheHit {
                    value,
                    hit_type: HitType::Similar,
                    similarity: candidate.similarity,
                    key: candidate.key,
                }))
            }
            None => {
                // The entry expired or was evicted behind the index's back
                self.index.remove(&candidate.key).await;
                Ok(None)
            }
        }
    }

    /// Stores a response; returns false when the request was not cacheable
    pub async fn set<V>(&self, request: &CacheRequest, value: &V) -> Result<bool, DomainError>
    where
        V: Serialize + Send + Sync,
    {
        if !self.config.enabled {
            return Ok(false);
        }

        if self.should_bypass(&request.prompt) {
            self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        let key = request.cache_key();
        self.cache.set(&key, value, self.config.ttl()).await?;

        if self.config.similarity_enabled {
            self.index
                .record(&key, &scope(request), &normalize_text(&request.prompt))
                .await;
        }

        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Removes the cached response for this request, if any
    pub async fn invalidate(&self, request: &CacheRequest) -> Result<bool, DomainError> {
        let key = request.cache_key();
        self.index.remove(&key).await;

        self.cache.delete(&key).await
    }

    pub fn stats(&self) -> SemanticCacheStats {
        SemanticCacheStats {
            exact_hits: self.counters.exact_hits.load(Ordering::Relaxed),
            similar_hits: self.counters.similar_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            bypassed: self.counters.bypassed.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
        }
    }
}

/// Model plus parameters; similar hits never cross scopes
fn scope(request: &CacheRequest) -> String {
    CacheKeyParams::new(request.model.clone())
        .with_component("params", serde_json::json!(request.params))
        .derive()
}
