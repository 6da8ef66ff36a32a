//! Semantic request cache domain models and traits
//!
//! Requests are normalized before key derivation so that incidental
//! formatting differences share one cache entry. A pluggable similarity
//! index can serve near-identical requests on exact misses.

mod config;
mod request;
mod similarity;

pub use config::{SemanticCacheConfig, DEFAULT_BYPASS_PATTERNS};
pub use request::{
    extract_template, normalize_text, CacheRequest, NormalizedRequest, RequestTemplate,
};
pub use similarity::{CacheHit, HitType, SimilarMatch, SimilarityIndex};
