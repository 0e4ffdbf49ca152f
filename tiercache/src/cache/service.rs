//! Cache service
//!
//! [`DataCache`] ties the identity resolver, the volatile tier and the
//! durable tier together and implements stale-while-revalidate reads for
//! data accessors. It is an explicitly constructed handle: clones share one
//! cache, separate `open` calls produce isolated caches.

use super::eviction::EvictionPolicy;
use super::invalidation::{InvalidationPattern, KeyScope};
use crate::config::{CacheConfig, StorageBackend};
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::{CacheError, Result};
use crate::core::keys::{self, CacheKey};
use crate::core::memory_store::MemoryStore;
use crate::core::types::{CacheEntry, CacheStats, ttl_millis};
use crate::identity::{IdentityProvider, IdentityResolver, Namespace};
use crate::storage::{DurableStore, FileMedium, KeyLayout, MemoryMedium, StorageMedium};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builder for [`DataCache`]
pub struct DataCacheBuilder {
    config: CacheConfig,
    identity: IdentityResolver,
    medium: Option<Arc<dyn StorageMedium>>,
    clock: Arc<dyn Clock>,
}

impl DataCacheBuilder {
    /// Resolve namespaces through `provider` instead of running anonymous
    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = IdentityResolver::new(provider);
        self
    }

    /// Use `medium` instead of the one described by the storage config
    pub fn with_medium(mut self, medium: Arc<dyn StorageMedium>) -> Self {
        self.medium = Some(medium);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the config, open the durable tier and rehydrate
    pub async fn open(self) -> Result<DataCache> {
        self.config.validate()?;

        let medium = match self.medium {
            Some(medium) => Some(medium),
            None => medium_from_config(&self.config),
        };

        let memory = MemoryStore::new(Arc::clone(&self.clock), self.config.stale_ratio);
        let durable = DurableStore::open(
            medium,
            KeyLayout::new(
                self.config.storage.global_prefix.clone(),
                self.config.storage.index_key.clone(),
            ),
            memory.clone(),
            Arc::clone(&self.clock),
            EvictionPolicy::default(),
        )
        .await;

        let cache = DataCache {
            inner: Arc::new(Inner {
                default_ttl: RwLock::new(self.config.default_ttl()),
                config: self.config,
                identity: self.identity,
                memory,
                durable,
                policy: EvictionPolicy::default(),
                stats: RwLock::new(CacheStats::default()),
                cleanup: Mutex::new(None),
            }),
        };

        cache.rehydrate().await;
        cache.start_cleanup();

        info!(
            "Cache opened (durable={}, default_ttl={}ms)",
            cache.inner.durable.is_available(),
            cache.inner.config.default_ttl_ms
        );
        Ok(cache)
    }
}

fn medium_from_config(config: &CacheConfig) -> Option<Arc<dyn StorageMedium>> {
    match config.storage.backend {
        StorageBackend::File => Some(Arc::new(FileMedium::new(
            config.storage.directory.clone(),
            config.quota_bytes(),
        ))),
        StorageBackend::Memory => Some(Arc::new(MemoryMedium::new(config.quota_bytes()))),
        StorageBackend::None => None,
    }
}

enum Tier {
    Memory,
    Durable,
}

struct Inner {
    config: CacheConfig,
    default_ttl: RwLock<Duration>,
    identity: IdentityResolver,
    memory: MemoryStore,
    durable: DurableStore,
    policy: EvictionPolicy,
    stats: RwLock<CacheStats>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

/// Two-tier cache handle
#[derive(Clone)]
pub struct DataCache {
    inner: Arc<Inner>,
}

impl DataCache {
    pub fn builder(config: CacheConfig) -> DataCacheBuilder {
        DataCacheBuilder {
            config,
            identity: IdentityResolver::anonymous(),
            medium: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Open with the given config, anonymous identity and system clock
    pub async fn open(config: CacheConfig) -> Result<Self> {
        Self::builder(config).open().await
    }

    /// Stop background work and drain the durable writer
    ///
    /// Later durable operations on any clone are skipped; the volatile tier
    /// keeps working until the last handle is dropped.
    pub async fn close(&self) {
        if let Some(task) = self.inner.cleanup.lock().take() {
            task.abort();
        }
        self.inner.durable.shutdown().await;
        info!("Cache closed");
    }

    fn start_cleanup(&self) {
        let interval_ms = self.inner.config.cleanup_interval_ms;
        if interval_ms == 0 {
            return;
        }
        debug!("Starting expiry sweep (interval={}ms)", interval_ms);

        // Hold only a weak reference so dropping every handle ends the task
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let expired = inner.memory.purge_expired();
                inner.durable.remove(expired).await;
            }
        });
        *self.inner.cleanup.lock() = Some(task);
    }

    /// Namespace of the currently active identity
    pub async fn namespace(&self) -> Namespace {
        self.inner.identity.resolve_namespace().await
    }

    /// Derive the key for `operation` and its parameters
    pub async fn generate_key(&self, operation: &str, params: Option<&Value>) -> CacheKey {
        let namespace = self.namespace().await;
        keys::generate_key(&namespace, operation, params)
    }

    /// Scope `key` to the active namespace
    ///
    /// `None` when the result belongs to another namespace, which only
    /// happens for an anonymous caller naming an identity's key.
    async fn scoped(&self, key: &str) -> Option<String> {
        let namespace = self.namespace().await;
        let scoped = namespace.scope(key);
        if namespace.owns(&scoped) {
            Some(scoped)
        } else {
            debug!("Key {} is outside namespace {}", key, namespace);
            None
        }
    }

    /// Live entry for `key`, from either tier
    pub async fn get_entry(&self, key: impl AsRef<str>) -> Option<CacheEntry> {
        let scoped = self.scoped(key.as_ref()).await?;
        self.lookup(&scoped).await
    }

    async fn lookup(&self, scoped: &str) -> Option<CacheEntry> {
        let found = self.find(scoped).await;
        let mut stats = self.inner.stats.write();
        match found {
            Some((entry, Tier::Memory)) => {
                stats.memory_hits += 1;
                Some(entry)
            }
            Some((entry, Tier::Durable)) => {
                stats.durable_hits += 1;
                Some(entry)
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Search both tiers without touching the statistics
    ///
    /// A durable hit is copied into the volatile tier.
    async fn find(&self, scoped: &str) -> Option<(CacheEntry, Tier)> {
        if let Some(entry) = self.inner.memory.get(scoped) {
            return Some((entry, Tier::Memory));
        }

        let entry = self.inner.durable.get(scoped).await?;
        debug!("Durable HIT for key: {}", scoped);
        self.inner.memory.insert_entry(scoped, entry.clone());
        Some((entry, Tier::Durable))
    }

    /// Cached value for `key`, or `None` if absent, expired or not a `T`
    pub async fn get<T: DeserializeOwned>(&self, key: impl AsRef<str>) -> Option<T> {
        let entry = self.get_entry(key.as_ref()).await?;
        decode(key.as_ref(), entry.data)
    }

    /// Whether a live entry exists for `key`
    pub async fn contains(&self, key: impl AsRef<str>) -> bool {
        self.get_entry(key).await.is_some()
    }

    /// Store `value` with the default TTL
    pub async fn set<T: Serialize>(&self, key: impl AsRef<str>, value: &T) -> Result<()> {
        let ttl = self.default_ttl();
        self.set_with_ttl(key, value, ttl).await
    }

    /// Store `value` in both tiers, replacing any previous entry
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: impl AsRef<str>,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        check_ttl(ttl)?;
        let data = serde_json::to_value(value)?;
        let scoped = self
            .scoped(key.as_ref())
            .await
            .ok_or_else(|| CacheError::ForeignKey(key.as_ref().to_string()))?;
        self.store(&scoped, data, ttl).await;
        Ok(())
    }

    async fn store(&self, scoped: &str, data: Value, ttl: Duration) {
        let entry = CacheEntry::new(data, self.inner.memory.now(), ttl);
        self.inner.memory.insert_entry(scoped, entry.clone());
        self.inner.stats.write().sets += 1;

        if let Some(outcome) = self.inner.durable.put(scoped, &entry).await {
            let mut stats = self.inner.stats.write();
            stats.evictions += outcome.evicted() as u64;
            if matches!(outcome, crate::storage::PutOutcome::Dropped { .. }) {
                stats.dropped_writes += 1;
            }
        }
    }

    /// Whether the live entry for `key` is older than `threshold`
    ///
    /// Defaults to the configured fraction of the entry's TTL. Not counted
    /// as a read in the statistics.
    pub async fn is_stale(&self, key: impl AsRef<str>, threshold: Option<Duration>) -> bool {
        let Some(scoped) = self.scoped(key.as_ref()).await else {
            return false;
        };
        let Some((entry, _)) = self.find(&scoped).await else {
            return false;
        };
        let threshold = threshold
            .map(|t| t.as_millis() as u64)
            .unwrap_or_else(|| entry.stale_threshold(self.inner.config.stale_ratio));
        entry.is_stale(self.now_millis(), threshold)
    }

    /// Current time of the cache clock in epoch milliseconds
    pub fn now_millis(&self) -> u64 {
        self.inner.memory.now()
    }

    /// Remove every key of the active identity matching `pattern`
    ///
    /// Both tiers are updated before this returns. Returns the number of
    /// volatile entries removed; no match is not an error.
    pub async fn invalidate(&self, pattern: impl Into<InvalidationPattern>) -> usize {
        let scope = KeyScope::matching(self.namespace().await, pattern.into());
        self.remove_scope(scope).await
    }

    /// Remove every entry of the active identity
    pub async fn clear(&self) -> usize {
        let scope = KeyScope::all(self.namespace().await);
        self.remove_scope(scope).await
    }

    async fn remove_scope(&self, scope: KeyScope) -> usize {
        let removed = self.inner.memory.delete_where(|key| scope.matches(key));
        let swept = self.inner.durable.sweep(scope).await;
        debug!(
            "Invalidated {} volatile and {} durable entries",
            removed.len(),
            swept
        );
        self.inner.stats.write().invalidations += removed.len().max(swept) as u64;
        removed.len()
    }

    /// Run one eviction pass, returning the number of entries removed
    pub async fn evict(&self) -> usize {
        let evicted = match self.inner.durable.evict().await {
            Some(evicted) => evicted,
            None => {
                let victims = self
                    .inner
                    .policy
                    .select(self.inner.memory.snapshot(), self.inner.memory.now());
                for key in &victims {
                    self.inner.memory.delete(key);
                }
                victims.len()
            }
        };
        self.inner.stats.write().evictions += evicted as u64;
        evicted
    }

    /// Load the active identity's persisted entries into the volatile tier
    ///
    /// Runs on open; call again after the identity changes.
    pub async fn rehydrate(&self) -> usize {
        let namespace = self.namespace().await;
        let loaded = self.inner.durable.rehydrate(namespace).await;
        let count = loaded.len();
        for (key, entry) in loaded {
            self.inner.memory.insert_entry(&key, entry);
        }
        count
    }

    /// Stale-while-revalidate read
    ///
    /// A live hit is returned immediately; if it is stale, `fetch` runs in
    /// the background and its result replaces the entry with the same TTL
    /// (a failure there is logged and the old entry kept). A miss awaits
    /// `fetch`, stores and returns its value, or returns its error
    /// unchanged without storing anything.
    pub async fn cache_first_with_refresh<T, E, F, Fut>(
        &self,
        key: impl AsRef<str>,
        fetch: F,
        ttl: Option<Duration>,
        stale_threshold: Option<Duration>,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let ttl = ttl
            .filter(|ttl| ttl_millis(*ttl) > 0)
            .unwrap_or_else(|| self.default_ttl());
        let Some(scoped) = self.scoped(key.as_ref()).await else {
            // Never cached under another identity's namespace
            return fetch().await;
        };

        if let Some(entry) = self.lookup(&scoped).await {
            let threshold = stale_threshold
                .map(|t| t.as_millis() as u64)
                .unwrap_or_else(|| entry.stale_threshold(self.inner.config.stale_ratio));
            let stale = entry.is_stale(self.inner.memory.now(), threshold);

            if let Some(value) = decode::<T>(&scoped, entry.data) {
                if stale {
                    self.inner.stats.write().stale_hits += 1;
                    self.spawn_refresh(scoped, fetch, ttl);
                }
                return Ok(value);
            }
        }

        let value = fetch().await?;
        match serde_json::to_value(&value) {
            Ok(data) => self.store(&scoped, data, ttl).await,
            Err(e) => warn!(error = %e, "Fetched value for {} not cacheable", scoped),
        }
        Ok(value)
    }

    fn spawn_refresh<T, E, F, Fut>(&self, scoped: String, fetch: F, ttl: Duration)
    where
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        debug!("Refreshing stale key in background: {}", scoped);
        let cache = self.clone();
        tokio::spawn(async move {
            match fetch().await {
                Ok(value) => match serde_json::to_value(&value) {
                    Ok(data) => {
                        cache.store(&scoped, data, ttl).await;
                        cache.inner.stats.write().refreshes += 1;
                    }
                    Err(e) => warn!(error = %e, "Refreshed value for {} not cacheable", scoped),
                },
                Err(e) => {
                    warn!(error = %e, "Background refresh failed for {}, keeping stale entry", scoped);
                    cache.inner.stats.write().refresh_failures += 1;
                }
            }
        });
    }

    /// Replace the TTL used when callers pass none
    pub fn set_default_ttl(&self, ttl: Duration) -> Result<()> {
        check_ttl(ttl)?;
        *self.inner.default_ttl.write() = ttl;
        Ok(())
    }

    pub fn default_ttl(&self) -> Duration {
        *self.inner.default_ttl.read()
    }

    /// Logical keys of the active identity currently held in memory
    pub async fn keys(&self) -> Vec<String> {
        let namespace = self.namespace().await;
        let mut keys: Vec<String> = self
            .inner
            .memory
            .keys()
            .into_iter()
            .filter(|key| namespace.owns(key))
            .map(|key| namespace.strip(&key).to_string())
            .collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.stats.read().clone();
        stats.entries = self.inner.memory.len();
        stats
    }

    /// Whether entries are persisted beyond this process
    pub fn is_durable(&self) -> bool {
        self.inner.durable.is_available()
    }
}

fn check_ttl(ttl: Duration) -> Result<()> {
    if ttl_millis(ttl) == 0 {
        return Err(CacheError::InvalidTtl("TTL must be greater than zero".to_string()));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(key: &str, data: Value) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Cached value for {} has a different shape, ignoring", key);
            None
        }
    }
}
