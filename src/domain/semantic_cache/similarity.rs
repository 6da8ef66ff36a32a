//! Similarity lookup seam and hit tagging

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a cached response was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitType {
    /// Same normalized request, model and parameters
    Exact,
    /// A different but sufficiently similar earlier request
    Similar,
}

/// A successful lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<V> {
    pub value: V,
    pub hit_type: HitType,
    /// 1.0 for exact hits
    pub similarity: f32,
    /// Key of the entry that served the hit
    pub key: String,
}

/// Candidate returned by a similarity index
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarMatch {
    pub key: String,
    pub similarity: f32,
}

/// Index over previously cached requests, consulted on exact misses
///
/// Requests are only compared within one `scope`, which identifies the
/// model and parameter set, so a similar hit never crosses models.
#[async_trait]
pub trait SimilarityIndex: Send + Sync + Debug {
    /// Records that `key` now holds the response for this request text
    async fn record(&self, key: &str, scope: &str, normalized_text: &str);

    /// Best match in the same scope at or above `threshold`
    async fn find_similar(
        &self,
        scope: &str,
        normalized_text: &str,
        threshold: f32,
    ) -> Option<SimilarMatch>;

    /// Forgets a key
    async fn remove(&self, key: &str);

    /// Forgets everything
    async fn clear(&self);
}
