//! Semantic request cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::cache::duration_millis;

/// Patterns for requests whose answers change between calls
pub const DEFAULT_BYPASS_PATTERNS: &[&str] = &[
    r"\bcurrent\s+(time|date)\b",
    r"\bright\s+now\b",
    r"\btoday\b",
    r"\brandom(ly)?\b",
    r"\blatest\b",
    r"\bmost\s+recent\b",
];

/// Configuration for the semantic request cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether caching is enabled at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether the similarity fallback is consulted on exact misses
    #[serde(default)]
    pub similarity_enabled: bool,

    /// Minimum similarity (0.0 to 1.0) for a similar hit
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Case-insensitive regexes; a matching prompt is never cached
    #[serde(default = "default_bypass_patterns")]
    pub bypass_patterns: Vec<String>,

    /// TTL for stored responses; `None` uses the llm class default
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Millisecond TTL, takes precedence over `ttl_secs`
    #[serde(default)]
    pub ttl_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_bypass_patterns() -> Vec<String> {
    DEFAULT_BYPASS_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            similarity_enabled: false,
            similarity_threshold: default_similarity_threshold(),
            bypass_patterns: default_bypass_patterns(),
            ttl_secs: None,
            ttl_ms: None,
        }
    }
}

impl SemanticCacheConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get TTL as Duration
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms
            .map(Duration::from_millis)
            .or_else(|| self.ttl_secs.map(Duration::from_secs))
    }

    /// Set whether caching is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Enable the similarity fallback with the given threshold
    pub fn with_similarity(mut self, threshold: f32) -> Self {
        self.similarity_enabled = true;
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Replace the bypass patterns
    pub fn with_bypass_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bypass_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the TTL for stored responses
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = Some(duration_millis(ttl));
        self.ttl_secs = None;
        self
    }
}
