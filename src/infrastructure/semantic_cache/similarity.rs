//! Similarity index implementations

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::semantic_cache::{SimilarMatch, SimilarityIndex};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").unwrap());

/// Index that never finds anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSimilarityIndex;

#[async_trait]
impl SimilarityIndex for NoopSimilarityIndex {
    async fn record(&self, _key: &str, _scope: &str, _normalized_text: &str) {}

    async fn find_similar(
        &self,
        _scope: &str,
        _normalized_text: &str,
        _threshold: f32,
    ) -> Option<SimilarMatch> {
        None
    }

    async fn remove(&self, _key: &str) {}

    async fn clear(&self) {}
}

#[derive(Debug)]
struct IndexedRequest {
    scope: String,
    tokens: HashSet<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    entries: HashMap<String, IndexedRequest>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

/// In-memory token-set index scored with Jaccard similarity
///
/// Uses a linear scan over the entries of one scope, which is fine for the
/// few thousand requests an llm class holds. The oldest entry is dropped
/// once `max_entries` is reached.
#[derive(Debug)]
pub struct JaccardSimilarityIndex {
    state: RwLock<IndexState>,
    max_entries: usize,
}

impl JaccardSimilarityIndex {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JaccardSimilarityIndex {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Lowercased alphanumeric tokens
pub fn tokenize(text: &str) -> HashSet<String> {
    NON_WORD
        .split(&text.to_lowercase())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// |a ∩ b| / |a ∪ b|, with two empty sets counting as identical
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;

    intersection as f32 / union as f32
}

#[async_trait]
impl SimilarityIndex for JaccardSimilarityIndex {
    async fn record(&self, key: &str, scope: &str, normalized_text: &str) {
        let request = IndexedRequest {
            scope: scope.to_string(),
            tokens: tokenize(normalized_text),
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.entries.insert(key.to_string(), request).is_some() {
            return;
        }
        state.order.push_back(key.to_string());

        while state.entries.len() > self.max_entries {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
        }
    }

    async fn find_similar(
        &self,
        scope: &str,
        normalized_text: &str,
        threshold: f32,
    ) -> Option<SimilarMatch> {
        let query = tokenize(normalized_text);
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        state
            .entries
            .iter()
            .filter(|(_, request)| request.scope == scope)
            .map(|(key, request)| SimilarMatch {
                key: key.clone(),
                similarity: jaccard(&query, &request.tokens),
            })
            .filter(|candidate| candidate.similarity >= threshold)
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
    }

    async fn remove(&self, key: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.entries.remove(key).is_some() {
            state.order.retain(|k| k != key);
        }
    }

    async fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.order.clear();
    }
}
