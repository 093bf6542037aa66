// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Caching layer for step results
//!
//! Results are keyed by (subject, operation, content hash). Identical content
//! always maps to the same key, however often or in whatever order it is
//! observed, so concurrent steps reading the same unchanged subject share one
//! entry.

mod hash;
mod memory;

pub use hash::{
    hash_bytes, hash_file, hash_json, hash_string, ContentHasher, FileContentHasher,
    HashStrategy, ParamsHasher, SubjectHasher, SubjectKey,
};
pub use memory::{Clock, ManualClock, ResultCache, SystemClock};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Composite cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Subject identifier (a file path, a step name, ...)
    pub subject: String,
    /// Operation performed on the subject
    pub operation: String,
    /// Hash of the subject's current content
    pub content_hash: String,
}

impl CacheKey {
    pub fn new(subject: &str, operation: &str, content_hash: &str) -> Self {
        Self {
            subject: subject.to_string(),
            operation: operation.to_string(),
            content_hash: content_hash.to_string(),
        }
    }
}

/// Cached result entry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub value: Value,
    /// When the entry was stored; drives TTL
    pub inserted_at: Instant,
    /// Last hit; drives LRU
    pub last_accessed_at: Instant,
}

impl CacheEntry {
    /// An entry is valid only while `now - inserted_at < ttl`
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) >= ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Expired entries removed by sweeps
    pub expirations: u64,
    /// Entries currently stored
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// hits / (hits + misses), or 0 when nothing has been looked up
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Instant::now();
        let entry = CacheEntry {
            key: CacheKey::new("a", "scan", "h"),
            value: Value::Null,
            inserted_at: now,
            last_accessed_at: now,
        };

        let ttl = Duration::from_secs(5);
        assert!(!entry.is_expired(now + Duration::from_secs(4), ttl));
        assert!(entry.is_expired(now + ttl, ttl));
    }
}
