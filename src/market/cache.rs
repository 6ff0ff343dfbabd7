//! TTL cache for batched fetch results.
//!
//! Plain map plus counters; sharing and locking belong to the client,
//! which keeps the cache behind an async mutex so no reader observes a
//! half-written entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

struct CacheEntry<T> {
    payload: T,
    inserted_at: Instant,
}

/// Counters snapshot for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// In-memory cache with a fixed TTL.
///
/// Expired entries count as misses and linger until overwritten by the
/// next `put` under the same key; there is no background eviction.
pub struct MarketDataCache<T> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<T>>,
    hit_count: u64,
    miss_count: u64,
}

impl<T: Clone> MarketDataCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            hit_count: 0,
            miss_count: 0,
        }
    }

    /// Fetch a live entry. Hits only when the entry exists and its age is
    /// strictly below the TTL; every call updates the counters.
    pub fn get(&mut self, key: &str) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                self.hit_count += 1;
                Some(entry.payload.clone())
            }
            _ => {
                self.miss_count += 1;
                None
            }
        }
    }

    /// Insert or overwrite; overwriting resets the entry's age.
    pub fn put(&mut self, key: String, payload: T) {
        self.entries.insert(
            key,
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hit_count: self.hit_count,
            miss_count: self.miss_count,
        }
    }
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_then_hit() {
        let mut cache = MarketDataCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("k"), None);
        cache.put("k".to_string(), 42);
        assert_eq!(cache.get("k"), Some(42));

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_lingers() {
        let mut cache = MarketDataCache::new(Duration::ZERO);
        cache.put("k".to_string(), 1);
        assert_eq!(cache.get("k"), None);
        // Still occupies a slot until overwritten.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().miss_count, 1);
    }

    #[test]
    fn test_overwrite_resets_age() {
        let mut cache = MarketDataCache::new(Duration::from_secs(60));
        cache.put("k".to_string(), 1);
        cache.put("k".to_string(), 2);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_keeps_counters() {
        let mut cache = MarketDataCache::new(Duration::from_secs(60));
        cache.put("k".to_string(), 1);
        cache.get("k");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hit_count, 1);
    }
}
