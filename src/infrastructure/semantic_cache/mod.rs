//! Semantic request cache and similarity indexes

mod service;
mod similarity;

pub use service::{SemanticCacheStats, SemanticRequestCache};
pub use similarity::{jaccard, tokenize, JaccardSimilarityIndex, NoopSimilarityIndex};
