use super::clock::Clock;
use super::types::CacheEntry;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Volatile tier: in-process map from scoped key to entry
///
/// Every operation takes the lock for a single synchronous section and
/// never across an `.await`.
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, CacheEntry>>>,
    clock: Arc<dyn Clock>,
    stale_ratio: f64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(clock: Arc<dyn Clock>, stale_ratio: f64) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            clock,
            stale_ratio,
        }
    }

    /// Get a live entry; expired entries are removed and reported absent
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();

        {
            let data = self.data.read();
            match data.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut data = self.data.write();
        // Re-check under the write lock, a concurrent set may have replaced it
        if data.get(key).is_some_and(|entry| entry.is_expired(now)) {
            data.remove(key);
            debug!("Volatile entry expired: {}", key);
        }
        data.get(key).cloned()
    }

    /// Store `data` under `key`, stamped now
    pub fn set(&self, key: &str, data: Value, ttl: Duration) {
        let entry = CacheEntry::new(data, self.clock.now_millis(), ttl);
        self.insert_entry(key, entry);
    }

    /// Store an entry keeping its original timestamp
    pub fn insert_entry(&self, key: &str, entry: CacheEntry) {
        debug!("Volatile SET: {} (ttl={}ms)", key, entry.ttl);
        self.data.write().insert(key.to_string(), entry);
    }

    /// Delete a key, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Delete every key matching `predicate`, returning the removed keys
    pub fn delete_where<F>(&self, predicate: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut data = self.data.write();
        let doomed: Vec<String> = data.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            data.remove(key);
        }
        doomed
    }

    /// Whether a live entry is past its staleness threshold
    ///
    /// Without an explicit threshold the entry's own TTL times the configured
    /// ratio is used. Absent and expired entries are never stale.
    pub fn is_stale(&self, key: &str, threshold: Option<Duration>) -> bool {
        let now = self.clock.now_millis();
        let data = self.data.read();
        match data.get(key) {
            Some(entry) => {
                let threshold = threshold
                    .map(|t| t.as_millis() as u64)
                    .unwrap_or_else(|| entry.stale_threshold(self.stale_ratio));
                entry.is_stale(now, threshold)
            }
            None => false,
        }
    }

    /// Remove all expired entries, returning their keys
    pub fn purge_expired(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let mut data = self.data.write();
        let expired: Vec<String> = data
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            data.remove(key);
        }
        if !expired.is_empty() {
            debug!("Purged {} expired volatile entries", expired.len());
        }
        expired
    }

    /// Copy of every (key, timestamp, ttl) triple, for eviction
    pub fn snapshot(&self) -> Vec<(String, u64, u64)> {
        self.data
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.timestamp, entry.ttl))
            .collect()
    }

    /// Keys currently held, including not-yet-purged expired ones
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> u64 {
        self.clock.now_millis()
    }
}
