use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Cached value with the metadata needed for expiry and staleness checks
///
/// Serialized as-is onto the durable medium, so the field names are part of
/// the persisted layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T = Value> {
    /// Cached payload
    pub data: T,
    /// When the entry was written (epoch milliseconds)
    pub timestamp: u64,
    /// Time-to-live in milliseconds, always non-zero
    pub ttl: u64,
}

impl<T> CacheEntry<T> {
    /// Create an entry stamped at `now`
    pub fn new(data: T, now: u64, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now,
            ttl: ttl_millis(ttl),
        }
    }

    /// Milliseconds elapsed since the entry was written
    pub fn age(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    /// Check if the entry has outlived its TTL
    pub fn is_expired(&self, now: u64) -> bool {
        self.age(now) > self.ttl
    }

    /// Check if a live entry is older than `threshold`
    ///
    /// Expired entries are never reported stale.
    pub fn is_stale(&self, now: u64, threshold: u64) -> bool {
        !self.is_expired(now) && self.age(now) > threshold
    }

    /// Staleness threshold derived from the entry's own TTL
    pub fn stale_threshold(&self, ratio: f64) -> u64 {
        (self.ttl as f64 * ratio) as u64
    }

    /// Remaining lifetime in milliseconds, zero once expired
    pub fn remaining_ttl(&self, now: u64) -> u64 {
        self.ttl.saturating_sub(self.age(now))
    }
}

/// TTL in milliseconds, rounded up so sub-millisecond TTLs are not zero
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    let millis = ttl.as_millis() as u64;
    if millis == 0 && !ttl.is_zero() { 1 } else { millis }
}

/// Statistics for the cache
#[derive(Debug, Default, Clone, Serialize)]
pub struct CacheStats {
    /// Reads served by the volatile store
    pub memory_hits: u64,
    /// Reads served by the durable store
    pub durable_hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Hits that triggered a background refresh
    pub stale_hits: u64,
    /// Background refreshes that stored new data
    pub refreshes: u64,
    /// Background refreshes whose fetch failed
    pub refresh_failures: u64,
    /// Number of SET operations
    pub sets: u64,
    /// Entries removed by invalidation or clear
    pub invalidations: u64,
    /// Entries removed by eviction
    pub evictions: u64,
    /// Durable writes given up after eviction and retry
    pub dropped_writes: u64,
    /// Entries currently held in the volatile store
    pub entries: usize,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
