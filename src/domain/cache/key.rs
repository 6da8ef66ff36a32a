//! Cache key derivation

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length in hex characters of every derived key
pub const KEY_LENGTH: usize = 64;

/// Parameters for cache key generation
///
/// Components are held in a sorted map, so the order in which they are
/// added never affects the derived key.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheKeyParams {
    /// Primary identifier (e.g., normalized prompt, task payload)
    pub primary: String,
    /// Secondary components (sorted for consistency)
    pub components: BTreeMap<String, serde_json::Value>,
}

impl CacheKeyParams {
    /// Creates new cache key parameters with a primary identifier
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            components: BTreeMap::new(),
        }
    }

    /// Adds a component to the key parameters
    pub fn with_component(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.components.insert(key.into(), value.into());
        self
    }

    /// Derives the fixed-length key for these parameters
    pub fn derive(&self) -> String {
        // serde_json maps are ordered, so nested objects are canonical as well
        let canonical = serde_json::to_string(self).unwrap_or_else(|_| self.primary.clone());
        hash_key(&canonical)
    }
}

/// Hex-encoded SHA-256 of the input
pub fn hash_key(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_params_with_components() {
        let params = CacheKeyParams::new("prompt")
            .with_component("model", "gpt-4")
            .with_component("temperature", 0.7);

        assert_eq!(params.primary, "prompt");
        assert_eq!(params.components.len(), 2);
        assert_eq!(params.components.get("model"), Some(&json!("gpt-4")));
    }

    #[test]
    fn test_derived_key_is_fixed_length() {
        let short = CacheKeyParams::new("a").derive();
        let long = CacheKeyParams::new("a".repeat(10_000))
            .with_component("model", "m")
            .derive();

        assert_eq!(short.len(), KEY_LENGTH);
        assert_eq!(long.len(), KEY_LENGTH);
    }

    #[test]
    fn test_components_order_is_irrelevant() {
        let first = CacheKeyParams::new("test")
            .with_component("zebra", "z")
            .with_component("apple", "a")
            .derive();
        let second = CacheKeyParams::new("test")
            .with_component("apple", "a")
            .with_component("zebra", "z")
            .derive();

        assert_eq!(first, second);
    }

    #[test]
    fn test_any_component_change_changes_key() {
        let base = CacheKeyParams::new("test").with_component("model", "m1");

        assert_ne!(
            base.derive(),
            CacheKeyParams::new("test").with_component("model", "m2").derive()
        );
        assert_ne!(
            base.derive(),
            CacheKeyParams::new("test2").with_component("model", "m1").derive()
        );
        assert_ne!(
            base.derive(),
            base.clone().with_component("temperature", 0.2).derive()
        );
    }

    #[test]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("abc"), hash_key("abc"));
        assert_eq!(
            hash_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
