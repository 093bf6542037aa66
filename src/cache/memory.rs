// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! In-memory result cache
//!
//! Bounded by entry count with least-recently-accessed eviction, and by age
//! through a TTL measured from insertion. Expired entries read as misses but
//! stay stored until a sweep removes them; sweeps run before any eviction and
//! on demand through [`ResultCache::sweep_expired`].

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{CacheEntry, CacheKey, CacheStats};
use crate::pipeline::CacheConfig;

/// Source of "now" for TTL and LRU bookkeeping
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

struct Slot {
    entry: CacheEntry,
    /// Position in the access order; unique and monotonically increasing
    seq: u64,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<CacheKey, Slot>,
    /// seq -> key, oldest access first
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.entry)
    }

    fn sweep(&mut self, now: Instant, ttl: Duration) -> usize {
        let expired: Vec<CacheKey> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }

        self.expirations += expired.len() as u64;
        expired.len()
    }

    fn evict_lru(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        self.slots.remove(&key);
        self.evictions += 1;
        Some(key)
    }
}

/// Thread-safe bounded result cache
///
/// Every public operation takes the internal lock once, so each call is atomic
/// with respect to the others and `len() <= capacity()` always holds.
pub struct ResultCache {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Create a cache holding at most `capacity` entries (minimum 1) for `ttl`
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_clock(capacity, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
            clock,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.ttl_secs))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the exact (subject, operation, hash) triple
    pub fn get(&self, subject: &str, operation: &str, content_hash: &str) -> Option<Value> {
        self.lookup(subject, operation, content_hash, |value| Some(value.clone()))
    }

    /// Counts a hit and refreshes the access order only when `read` accepts
    /// the live value; anything else is a miss that leaves the order alone
    fn lookup<T>(
        &self,
        subject: &str,
        operation: &str,
        content_hash: &str,
        read: impl FnOnce(&Value) -> Option<T>,
    ) -> Option<T> {
        let key = CacheKey::new(subject, operation, content_hash);
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let found = inner
            .slots
            .get(&key)
            .filter(|slot| !slot.entry.is_expired(now, self.ttl))
            .and_then(|slot| read(&slot.entry.value));

        let Some(found) = found else {
            inner.misses += 1;
            return None;
        };

        let seq = inner.bump();
        if let Some(slot) = inner.slots.get_mut(&key) {
            let old_seq = std::mem::replace(&mut slot.seq, seq);
            slot.entry.last_accessed_at = now;
            inner.order.remove(&old_seq);
            inner.order.insert(seq, key);
        }
        inner.hits += 1;

        Some(found)
    }

    /// Insert or overwrite the entry for the triple
    pub fn set(&self, subject: &str, operation: &str, content_hash: &str, value: Value) {
        let key = CacheKey::new(subject, operation, content_hash);
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        if inner.remove(&key).is_none() && inner.slots.len() >= self.capacity {
            inner.sweep(now, self.ttl);
            while inner.slots.len() >= self.capacity {
                if let Some(evicted) = inner.evict_lru() {
                    tracing::debug!(subject = %evicted.subject, operation = %evicted.operation, "Evicted cache entry");
                } else {
                    break;
                }
            }
        }

        let seq = inner.bump();
        inner.order.insert(seq, key.clone());
        inner.slots.insert(
            key.clone(),
            Slot {
                entry: CacheEntry {
                    key,
                    value,
                    inserted_at: now,
                    last_accessed_at: now,
                },
                seq,
            },
        );
    }

    /// Typed lookup; a value that no longer deserializes reads as a miss
    pub fn get_as<T: DeserializeOwned>(
        &self,
        subject: &str,
        operation: &str,
        content_hash: &str,
    ) -> Option<T> {
        self.lookup(subject, operation, content_hash, |value| {
            match <T as serde::Deserialize>::deserialize(value) {
                Ok(typed) => Some(typed),
                Err(e) => {
                    tracing::warn!(subject, operation, error = %e, "Cached value does not deserialize, treating as miss");
                    None
                }
            }
        })
    }

    /// Typed store; a value that fails to serialize is not stored
    pub fn set_from<T: Serialize>(
        &self,
        subject: &str,
        operation: &str,
        content_hash: &str,
        value: &T,
    ) -> bool {
        match serde_json::to_value(value) {
            Ok(json) => {
                self.set(subject, operation, content_hash, json);
                true
            }
            Err(e) => {
                tracing::warn!(subject, operation, error = %e, "Failed to serialize value for cache, skipping store");
                false
            }
        }
    }

    /// Remove every entry for `subject`, whatever its operation or hash
    pub fn invalidate(&self, subject: &str) -> usize {
        let mut inner = self.inner.lock();

        let keys: Vec<CacheKey> = inner
            .slots
            .keys()
            .filter(|key| key.subject == subject)
            .cloned()
            .collect();

        for key in &keys {
            inner.remove(key);
        }

        if !keys.is_empty() {
            tracing::debug!(subject, removed = keys.len(), "Invalidated cache entries");
        }

        keys.len()
    }

    /// Physically remove expired entries, returning how many were dropped
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        self.inner.lock().sweep(now, self.ttl)
    }

    /// Whether an entry for the triple is stored, expired or not.
    /// Does not touch counters or access order.
    pub fn contains(&self, subject: &str, operation: &str, content_hash: &str) -> bool {
        let key = CacheKey::new(subject, operation, content_hash);
        self.inner.lock().slots.contains_key(&key)
    }

    /// Drop all entries; counters are kept
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.order.clear();
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            size: inner.slots.len(),
            capacity: self.capacity,
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOUR: Duration = Duration::from_secs(3600);

    fn cache_with_clock(capacity: usize, ttl: Duration) -> (ResultCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = ResultCache::with_clock(capacity, ttl, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = ResultCache::new(8, HOUR);

        cache.set("src/lib.rs", "scan", "h1", json!({ "issues": 2 }));

        assert_eq!(cache.get("src/lib.rs", "scan", "h1"), Some(json!({ "issues": 2 })));
        assert_eq!(cache.get("src/lib.rs", "scan", "h2"), None);
        assert_eq!(cache.get("src/lib.rs", "report", "h1"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_overwrite_same_key_keeps_one_entry() {
        let cache = ResultCache::new(2, HOUR);

        cache.set("a", "scan", "h", json!(1));
        cache.set("a", "scan", "h", json!(2));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a", "scan", "h"), Some(json!(2)));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_eviction_removes_least_recently_accessed() {
        let cache = ResultCache::new(3, HOUR);

        cache.set("a", "scan", "h", json!("a"));
        cache.set("b", "scan", "h", json!("b"));
        cache.set("c", "scan", "h", json!("c"));

        // "a" becomes the most recent; "b" is now the oldest access
        assert!(cache.get("a", "scan", "h").is_some());

        cache.set("d", "scan", "h", json!("d"));

        let stats = cache.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.size, 3);
        assert!(!cache.contains("b", "scan", "h"));
        assert!(cache.contains("a", "scan", "h"));
        assert!(cache.contains("c", "scan", "h"));
        assert!(cache.contains("d", "scan", "h"));
    }

    #[test]
    fn test_eviction_ties_follow_insertion_order() {
        let cache = ResultCache::new(2, HOUR);

        cache.set("first", "scan", "h", json!(1));
        cache.set("second", "scan", "h", json!(2));
        cache.set("third", "scan", "h", json!(3));

        assert!(!cache.contains("first", "scan", "h"));
        assert!(cache.contains("second", "scan", "h"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss_until_swept() {
        let (cache, clock) = cache_with_clock(4, Duration::from_secs(60));

        cache.set("a", "scan", "h", json!(true));
        clock.advance(Duration::from_secs(59));
        assert!(cache.get("a", "scan", "h").is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a", "scan", "h"), None);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("a", "scan", "h"));

        assert_eq!(cache.sweep_expired(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_ttl_counts_from_insertion_not_access() {
        let (cache, clock) = cache_with_clock(4, Duration::from_secs(10));

        cache.set("a", "scan", "h", json!(1));
        for _ in 0..3 {
            clock.advance(Duration::from_secs(4));
            let _ = cache.get("a", "scan", "h");
        }

        // 12s after insertion; the hits at 4s and 8s do not extend it
        assert_eq!(cache.get("a", "scan", "h"), None);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_full_cache_drops_expired_before_evicting() {
        let (cache, clock) = cache_with_clock(2, Duration::from_secs(10));

        cache.set("old", "scan", "h", json!(1));
        clock.advance(Duration::from_secs(8));
        cache.set("young", "scan", "h", json!(2));
        clock.advance(Duration::from_secs(3));

        cache.set("new", "scan", "h", json!(3));

        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
        assert!(cache.contains("young", "scan", "h"));
        assert!(cache.contains("new", "scan", "h"));
    }

    #[test]
    fn test_invalidate_removes_all_entries_for_subject() {
        let cache = ResultCache::new(8, HOUR);

        cache.set("a.rs", "scan", "h1", json!(1));
        cache.set("a.rs", "report", "h2", json!(2));
        cache.set("b.rs", "scan", "h1", json!(3));

        assert_eq!(cache.invalidate("a.rs"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a.rs", "scan", "h1"), None);
        assert!(cache.get("b.rs", "scan", "h1").is_some());
        assert_eq!(cache.invalidate("a.rs"), 0);
    }

    #[test]
    fn test_hit_rate() {
        let cache = ResultCache::new(4, HOUR);
        assert_eq!(cache.stats().hit_rate(), 0.0);

        cache.set("a", "scan", "h", json!(1));
        let _ = cache.get("a", "scan", "h");
        let _ = cache.get("a", "scan", "h");
        let _ = cache.get("a", "scan", "x");
        let _ = cache.get("a", "scan", "y");

        assert!((cache.stats().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = ResultCache::new(0, HOUR);
        cache.set("a", "scan", "h", json!(1));
        cache.set("b", "scan", "h", json!(2));

        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("b", "scan", "h"));
    }

    #[test]
    fn test_typed_access_degrades_to_miss() {
        let cache = ResultCache::new(4, HOUR);

        assert!(cache.set_from("a", "count", "h", &vec![1u32, 2, 3]));
        assert_eq!(cache.get_as::<Vec<u32>>("a", "count", "h"), Some(vec![1, 2, 3]));
        assert_eq!(cache.get_as::<String>("a", "count", "h"), None);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));

        let mut bad = HashMap::new();
        bad.insert(vec![1u8], 1u8);
        assert!(!cache.set_from("b", "count", "h", &bad));
        assert!(!cache.contains("b", "count", "h"));
    }

    #[test]
    fn test_failed_typed_read_keeps_lru_position() {
        let cache = ResultCache::new(2, HOUR);

        cache.set("a", "count", "h", json!([1, 2]));
        cache.set("b", "count", "h", json!([3, 4]));

        // Unreadable as a string: must not refresh "a"
        assert_eq!(cache.get_as::<String>("a", "count", "h"), None);
        cache.set("c", "count", "h", json!([5]));

        assert!(!cache.contains("a", "count", "h"));
        assert!(cache.contains("b", "count", "h"));
        assert_eq!(cache.stats().hits, 0);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_concurrent_access_respects_capacity() {
        let cache = Arc::new(ResultCache::new(16, HOUR));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let subject = format!("s{}", (t * 7 + i) % 40);
                        if cache.get(&subject, "scan", "h").is_none() {
                            cache.set(&subject, "scan", "h", json!(i));
                        }
                        assert!(cache.len() <= 16);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert!(stats.size <= 16);
        assert_eq!(stats.hits + stats.misses, 8 * 200);
    }
}
