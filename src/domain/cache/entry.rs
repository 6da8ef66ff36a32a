//! Cache entry and statistics types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
pub fn current_time_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Whole milliseconds in `duration`, rounded up and saturating at `u64::MAX`
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}

/// A stored cache value with its expiry metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    /// Key the entry was stored under
    pub key: String,
    /// Serialized JSON value
    pub value: String,
    /// Creation timestamp (millis since epoch)
    pub created_at: u64,
    /// Expiration timestamp (millis since epoch); `None` never expires
    pub expires_at: Option<u64>,
    /// Approximate size in bytes
    pub size_bytes: usize,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: Option<Duration>) -> Self {
        let key = key.into();
        let value = value.into();
        let created_at = current_time_millis();
        let size_bytes = key.len() + value.len();

        Self {
            key,
            value,
            created_at,
            expires_at: ttl.map(|ttl| created_at.saturating_add(duration_millis(ttl))),
            size_bytes,
        }
    }

    /// An entry is expired once its expiry instant has been reached,
    /// so a zero TTL is expired immediately.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| current_time_millis() >= expires_at)
    }

    /// Remaining lifetime, `None` for entries that never expire
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| {
            Duration::from_millis(expires_at.saturating_sub(current_time_millis()))
        })
    }
}

/// Per-store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub size_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups that were hits, 0.0 before any lookup
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;

        if total == 0 {
            return 0.0;
        }

        self.hits as f64 / total as f64
    }

    /// Adds another store's counters to these
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.entry_count += other.entry_count;
        self.size_bytes += other.size_bytes;
        self.evictions += other.evictions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = CacheEntry::new("k", "\"v\"", None);

        assert!(!entry.is_expired());
        assert!(entry.expires_at.is_none());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let entry = CacheEntry::new("k", "\"v\"", Some(Duration::ZERO));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_ttl_remaining() {
        let entry = CacheEntry::new("k", "\"v\"", Some(Duration::from_secs(60)));
        let remaining = entry.ttl_remaining().unwrap();

        assert!(!entry.is_expired());
        assert!(remaining.as_secs() > 50 && remaining.as_secs() <= 60);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let entry = CacheEntry::new("k", "\"v\"", Some(Duration::MAX));

        assert_eq!(entry.expires_at, Some(u64::MAX));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_duration_millis_rounds_up() {
        assert_eq!(duration_millis(Duration::ZERO), 0);
        assert_eq!(duration_millis(Duration::from_micros(1)), 1);
        assert_eq!(duration_millis(Duration::from_millis(500)), 500);
        assert_eq!(duration_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_entry_size() {
        let entry = CacheEntry::new("key", "12345", None);
        assert_eq!(entry.size_bytes, 8);
    }

    #[test]
    fn test_hit_ratio_without_requests() {
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_merge() {
        let mut total = CacheStats {
            hits: 1,
            misses: 2,
            entry_count: 3,
            size_bytes: 4,
            evictions: 5,
        };
        total.merge(&total.clone());

        assert_eq!(total.hits, 2);
        assert_eq!(total.evictions, 10);
    }
}
