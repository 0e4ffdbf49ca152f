//! Durable tier adapter
//!
//! Wraps a [`StorageMedium`] with the physical key layout, the side index of
//! every key written, and a single writer task through which all mutations
//! are serialized. Serializing through one queue means the index
//! read-modify-write can never lose an update.

use super::medium::StorageMedium;
use crate::cache::eviction::EvictionPolicy;
use crate::cache::invalidation::KeyScope;
use crate::core::clock::Clock;
use crate::core::error::StorageError;
use crate::core::memory_store::MemoryStore;
use crate::core::types::CacheEntry;
use crate::identity::Namespace;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Physical key layout on the medium
#[derive(Debug, Clone)]
pub struct KeyLayout {
    global_prefix: String,
    index_key: String,
}

impl KeyLayout {
    pub fn new(global_prefix: impl Into<String>, index_key: impl Into<String>) -> Self {
        Self {
            global_prefix: global_prefix.into(),
            index_key: index_key.into(),
        }
    }

    /// `<globalPrefix><scopedKey>`
    pub fn physical(&self, scoped_key: &str) -> String {
        format!("{}{}", self.global_prefix, scoped_key)
    }

    /// Inverse of [`KeyLayout::physical`]
    pub fn scoped<'a>(&self, physical_key: &'a str) -> Option<&'a str> {
        physical_key.strip_prefix(self.global_prefix.as_str())
    }

    pub fn index_key(&self) -> &str {
        &self.index_key
    }
}

/// Result of a durable write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// Written, `evicted` entries were reclaimed first
    Stored { evicted: usize },
    /// Given up; the volatile tier still holds the value
    Dropped { evicted: usize },
}

impl PutOutcome {
    pub fn evicted(&self) -> usize {
        match self {
            Self::Stored { evicted } | Self::Dropped { evicted } => *evicted,
        }
    }
}

/// Mutation sent to the writer, each answered on its own channel
enum Command {
    Put {
        key: String,
        payload: String,
        reply: oneshot::Sender<PutOutcome>,
    },
    Remove {
        keys: Vec<String>,
        reply: oneshot::Sender<usize>,
    },
    /// Remove `key` only if the medium still holds `observed`
    Discard {
        key: String,
        observed: String,
        reply: oneshot::Sender<bool>,
    },
    Sweep {
        scope: KeyScope,
        reply: oneshot::Sender<usize>,
    },
    Rehydrate {
        namespace: Namespace,
        reply: oneshot::Sender<Vec<(String, CacheEntry)>>,
    },
    Evict {
        reply: oneshot::Sender<usize>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Durable tier, selected once at construction
#[derive(Clone)]
pub enum DurableStore {
    /// Medium probed successfully
    Available(DurableHandle),
    /// No usable medium; the cache runs volatile-only
    Degraded,
}

impl DurableStore {
    /// Probe `medium` and start the writer
    ///
    /// Any failure selects [`DurableStore::Degraded`]; nothing is surfaced.
    pub async fn open(
        medium: Option<Arc<dyn StorageMedium>>,
        layout: KeyLayout,
        memory: MemoryStore,
        clock: Arc<dyn Clock>,
        policy: EvictionPolicy,
    ) -> Self {
        let Some(medium) = medium else {
            info!("No durable medium configured, running volatile-only");
            return Self::Degraded;
        };

        if let Err(e) = medium.probe().await {
            warn!(error = %e, "Durable medium unavailable, running volatile-only");
            return Self::Degraded;
        }

        let index = load_index(medium.as_ref(), &layout).await;
        info!("Durable store opened with {} indexed keys", index.len());

        let layout = Arc::new(layout);
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Writer {
            medium: Arc::clone(&medium),
            layout: Arc::clone(&layout),
            index,
            memory,
            clock: Arc::clone(&clock),
            policy,
        };
        let task = tokio::spawn(writer.run(rx));

        Self::Available(DurableHandle {
            tx,
            medium,
            layout,
            clock,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Read a live entry; malformed and expired entries are deleted
    pub async fn get(&self, scoped_key: &str) -> Option<CacheEntry> {
        match self {
            Self::Available(handle) => handle.get(scoped_key).await,
            Self::Degraded => None,
        }
    }

    pub async fn put(&self, scoped_key: &str, entry: &CacheEntry) -> Option<PutOutcome> {
        match self {
            Self::Available(handle) => handle.put(scoped_key, entry).await,
            Self::Degraded => None,
        }
    }

    pub async fn remove(&self, scoped_keys: Vec<String>) -> usize {
        match self {
            Self::Available(handle) if !scoped_keys.is_empty() => handle
                .request(|reply| Command::Remove {
                    keys: scoped_keys,
                    reply,
                })
                .await
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Remove every indexed key inside `scope`
    pub async fn sweep(&self, scope: KeyScope) -> usize {
        match self {
            Self::Available(handle) => handle
                .request(|reply| Command::Sweep { scope, reply })
                .await
                .unwrap_or(0),
            Self::Degraded => 0,
        }
    }

    /// Load the live entries owned by `namespace`
    pub async fn rehydrate(&self, namespace: Namespace) -> Vec<(String, CacheEntry)> {
        match self {
            Self::Available(handle) => handle
                .request(|reply| Command::Rehydrate { namespace, reply })
                .await
                .unwrap_or_default(),
            Self::Degraded => Vec::new(),
        }
    }

    /// Run one eviction pass over both tiers
    pub async fn evict(&self) -> Option<usize> {
        match self {
            Self::Available(handle) => handle.request(|reply| Command::Evict { reply }).await,
            Self::Degraded => None,
        }
    }

    /// Drain pending mutations and stop the writer
    pub async fn shutdown(&self) {
        if let Self::Available(handle) = self {
            handle.shutdown().await;
        }
    }
}

/// Handle to an available durable tier
#[derive(Clone)]
pub struct DurableHandle {
    tx: mpsc::UnboundedSender<Command>,
    medium: Arc<dyn StorageMedium>,
    layout: Arc<KeyLayout>,
    clock: Arc<dyn Clock>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl DurableHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(build(reply)).is_err() {
            debug!("Durable writer stopped, request skipped");
            return None;
        }
        response.await.ok()
    }

    async fn get(&self, scoped_key: &str) -> Option<CacheEntry> {
        let physical = self.layout.physical(scoped_key);
        let raw = match self.medium.read(&physical).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Durable read failed for {}", physical);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if !entry.is_expired(self.clock.now_millis()) => Some(entry),
            Ok(_) => {
                debug!("Durable entry expired: {}", scoped_key);
                self.discard(scoped_key, raw).await;
                None
            }
            Err(e) => {
                warn!(error = %e, "Malformed durable entry under {}, removing", physical);
                self.discard(scoped_key, raw).await;
                None
            }
        }
    }

    /// Remove the value read outside the writer, unless it was replaced since
    async fn discard(&self, scoped_key: &str, observed: String) -> bool {
        let key = scoped_key.to_string();
        self.request(|reply| Command::Discard {
            key,
            observed,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    async fn put(&self, scoped_key: &str, entry: &CacheEntry) -> Option<PutOutcome> {
        let payload = match serde_json::to_string(entry) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Could not serialize entry {}, durable write skipped", scoped_key);
                return Some(PutOutcome::Dropped { evicted: 0 });
            }
        };
        let key = scoped_key.to_string();
        self.request(|reply| Command::Put { key, payload, reply }).await
    }

    async fn shutdown(&self) {
        self.request(|reply| Command::Shutdown { reply }).await;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Durable writer task ended abnormally");
            }
        }
    }
}

async fn load_index(medium: &dyn StorageMedium, layout: &KeyLayout) -> BTreeSet<String> {
    match medium.read(layout.index_key()).await {
        Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(keys) => keys.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Malformed key index, starting empty");
                BTreeSet::new()
            }
        },
        Ok(None) => BTreeSet::new(),
        Err(e) => {
            warn!(error = %e, "Could not read key index, starting empty");
            BTreeSet::new()
        }
    }
}

/// Sole owner of the index; applies mutations one at a time
struct Writer {
    medium: Arc<dyn StorageMedium>,
    layout: Arc<KeyLayout>,
    index: BTreeSet<String>,
    memory: MemoryStore,
    clock: Arc<dyn Clock>,
    policy: EvictionPolicy,
}

impl Writer {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Put { key, payload, reply } => {
                    let outcome = self.put(&key, &payload).await;
                    let _ = reply.send(outcome);
                }
                Command::Remove { keys, reply } => {
                    let removed = self.remove(&keys).await;
                    let _ = reply.send(removed);
                }
                Command::Discard {
                    key,
                    observed,
                    reply,
                } => {
                    let removed = self.discard(&key, &observed).await;
                    let _ = reply.send(removed);
                }
                Command::Sweep { scope, reply } => {
                    let removed = self.sweep(&scope).await;
                    let _ = reply.send(removed);
                }
                Command::Rehydrate { namespace, reply } => {
                    let loaded = self.rehydrate(&namespace).await;
                    let _ = reply.send(loaded);
                }
                Command::Evict { reply } => {
                    let evicted = self.evict().await;
                    let _ = reply.send(evicted);
                }
                Command::Shutdown { reply } => {
                    let _ = reply.send(());
                    break;
                }
            }
        }
        debug!("Durable writer stopped");
    }

    async fn put(&mut self, key: &str, payload: &str) -> PutOutcome {
        let physical = self.layout.physical(key);
        let mut evicted = 0;

        if let Err(e) = self.write_or_evict(&physical, payload, &mut evicted).await {
            warn!(
                error = %e,
                "Durable write failed for {} after evicting {} entries, dropped",
                key, evicted
            );
            // An older copy must not resurrect on the next start
            self.forget(physical).await;
            return PutOutcome::Dropped { evicted };
        }

        if !self.index.insert(physical.clone()) {
            return PutOutcome::Stored { evicted };
        }

        if let Err(e) = self.save_index_or_evict(&mut evicted).await {
            warn!(
                error = %e,
                "Key index not persisted for {}, rolling the entry back",
                key
            );
            // Entries never outlive their slot in the persisted index
            self.index.remove(&physical);
            if let Err(e) = self.medium.delete(&physical).await {
                warn!(error = %e, "Durable delete failed for {}", physical);
            }
            self.persist_index().await;
            return PutOutcome::Dropped { evicted };
        }

        PutOutcome::Stored { evicted }
    }

    /// Write `payload`, evicting once and retrying when the quota is full
    async fn write_or_evict(
        &mut self,
        physical: &str,
        payload: &str,
        evicted: &mut usize,
    ) -> Result<(), StorageError> {
        match self.medium.write(physical, payload).await {
            Err(e) if e.is_quota_exceeded() => {
                debug!(error = %e, "Quota exceeded writing {}, evicting", physical);
                *evicted += self.evict().await;
                self.medium.write(physical, payload).await
            }
            result => result,
        }
    }

    async fn save_index_or_evict(&mut self, evicted: &mut usize) -> Result<(), StorageError> {
        match self.save_index().await {
            Err(e) if e.is_quota_exceeded() => {
                debug!(error = %e, "Quota exceeded writing key index, evicting");
                *evicted += self.evict().await;
                self.save_index().await
            }
            result => result,
        }
    }

    async fn discard(&mut self, key: &str, observed: &str) -> bool {
        let physical = self.layout.physical(key);
        match self.medium.read(&physical).await {
            Ok(Some(current)) if current == observed => {
                self.forget(physical).await;
                true
            }
            Ok(None) => {
                self.forget(physical).await;
                false
            }
            Ok(Some(_)) => {
                debug!("Skipping discard of {}, replaced since it was read", key);
                false
            }
            Err(e) => {
                warn!(error = %e, "Could not re-read {} before discarding", physical);
                false
            }
        }
    }

    async fn remove(&mut self, scoped_keys: &[String]) -> usize {
        let mut removed = 0;
        for key in scoped_keys {
            let physical = self.layout.physical(key);
            if self.delete_physical(&physical).await {
                removed += 1;
            }
        }
        self.persist_index().await;
        removed
    }

    async fn sweep(&mut self, scope: &KeyScope) -> usize {
        let doomed: Vec<String> = self
            .index
            .iter()
            .filter(|physical| {
                self.layout
                    .scoped(physical)
                    .is_some_and(|scoped| scope.matches(scoped))
            })
            .cloned()
            .collect();

        for physical in &doomed {
            self.delete_physical(physical).await;
        }
        if !doomed.is_empty() {
            self.persist_index().await;
        }
        debug!("Swept {} durable keys for {}", doomed.len(), scope.namespace());
        doomed.len()
    }

    async fn rehydrate(&mut self, namespace: &Namespace) -> Vec<(String, CacheEntry)> {
        let now = self.clock.now_millis();
        let owned: Vec<String> = self
            .index
            .iter()
            .filter(|physical| {
                self.layout
                    .scoped(physical)
                    .is_some_and(|scoped| namespace.owns(scoped))
            })
            .cloned()
            .collect();

        let mut loaded = Vec::new();
        let mut doomed = Vec::new();

        for physical in owned {
            let Some(scoped) = self.layout.scoped(&physical).map(str::to_string) else {
                continue;
            };
            match self.medium.read(&physical).await {
                Ok(Some(raw)) => match serde_json::from_str::<CacheEntry>(&raw) {
                    Ok(entry) if !entry.is_expired(now) => loaded.push((scoped, entry)),
                    Ok(_) => doomed.push(physical),
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed entry {}", physical);
                        doomed.push(physical);
                    }
                },
                // Indexed but gone from the medium
                Ok(None) => doomed.push(physical),
                Err(e) => warn!(error = %e, "Could not read {} during rehydration", physical),
            }
        }

        for physical in &doomed {
            self.delete_physical(physical).await;
        }
        if !doomed.is_empty() {
            self.persist_index().await;
        }

        info!(
            "Rehydrated {} entries for {} ({} expired or invalid dropped)",
            loaded.len(),
            namespace,
            doomed.len()
        );
        loaded
    }

    /// Evict from both tiers; the caller is already on the writer task
    async fn evict(&mut self) -> usize {
        let victims = self
            .policy
            .select(self.memory.snapshot(), self.clock.now_millis());
        if victims.is_empty() {
            debug!("Eviction found no candidates");
            return 0;
        }

        for key in &victims {
            self.memory.delete(key);
            let physical = self.layout.physical(key);
            self.delete_physical(&physical).await;
        }
        self.persist_index().await;

        info!("Evicted {} entries under storage pressure", victims.len());
        victims.len()
    }

    async fn forget(&mut self, physical: String) {
        if self.delete_physical(&physical).await {
            self.persist_index().await;
        }
    }

    /// Delete from the medium and the in-memory index; true if it was indexed
    async fn delete_physical(&mut self, physical: &str) -> bool {
        if let Err(e) = self.medium.delete(physical).await {
            warn!(error = %e, "Durable delete failed for {}", physical);
        }
        self.index.remove(physical)
    }

    async fn save_index(&self) -> Result<(), StorageError> {
        let keys: Vec<&String> = self.index.iter().collect();
        let payload = serde_json::to_string(&keys).map_err(|e| StorageError::Corrupt {
            key: self.layout.index_key().to_string(),
            reason: e.to_string(),
        })?;
        self.medium.write(self.layout.index_key(), &payload).await
    }

    /// Persist the index after removals; a shrinking index only logs on failure
    async fn persist_index(&self) {
        if let Err(e) = self.save_index().await {
            warn!(error = %e, "Could not persist key index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::storage::MemoryMedium;
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        store: DurableStore,
        medium: MemoryMedium,
        memory: MemoryStore,
        clock: ManualClock,
    }

    async fn fixture(quota: u64) -> Fixture {
        let clock = ManualClock::new(100_000);
        let medium = MemoryMedium::new(quota);
        let memory = MemoryStore::new(Arc::new(clock.clone()), 0.5);
        let store = DurableStore::open(
            Some(Arc::new(medium.clone())),
            KeyLayout::new("cache_", "cache-index"),
            memory.clone(),
            Arc::new(clock.clone()),
            EvictionPolicy::default(),
        )
        .await;
        Fixture {
            store,
            medium,
            memory,
            clock,
        }
    }

    fn index_of(medium: &MemoryMedium) -> Vec<String> {
        serde_json::from_str(&medium.raw_value("cache-index").unwrap_or_else(|| "[]".into()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_put_get_and_index() {
        let fx = fixture(10_000).await;
        let entry = CacheEntry::new(json!({"n": 1}), fx.clock.now_millis(), Duration::from_secs(10));

        let outcome = fx.store.put("user_1_widgets", &entry).await;
        assert_eq!(outcome, Some(PutOutcome::Stored { evicted: 0 }));
        assert_eq!(fx.store.get("user_1_widgets").await, Some(entry));
        assert_eq!(index_of(&fx.medium), vec!["cache_user_1_widgets".to_string()]);

        fx.store.remove(vec!["user_1_widgets".to_string()]).await;
        assert!(fx.store.get("user_1_widgets").await.is_none());
        assert!(index_of(&fx.medium).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_entry_is_removed() {
        let fx = fixture(10_000).await;
        let entry = CacheEntry::new(json!(1), fx.clock.now_millis(), Duration::from_secs(10));
        fx.store.put("k", &entry).await;

        fx.medium.inject_raw("cache_k", "{not json");
        assert!(fx.store.get("k").await.is_none());
        assert!(fx.medium.raw_value("cache_k").is_none());
        assert!(index_of(&fx.medium).is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed() {
        let fx = fixture(10_000).await;
        let entry = CacheEntry::new(json!(1), fx.clock.now_millis(), Duration::from_millis(50));
        fx.store.put("k", &entry).await;

        fx.clock.advance(Duration::from_millis(51));
        assert!(fx.store.get("k").await.is_none());
        assert!(fx.medium.raw_value("cache_k").is_none());
    }

    #[tokio::test]
    async fn test_quota_pressure_evicts_and_retries() {
        let fx = fixture(300).await;
        let start = fx.clock.now_millis();

        for i in 0..3 {
            let key = format!("old{i}");
            let entry = CacheEntry::new(json!("x".repeat(20)), start, Duration::from_millis(1000));
            fx.memory.insert_entry(&key, entry.clone());
            fx.store.put(&key, &entry).await;
        }

        fx.clock.advance(Duration::from_millis(600));
        let fresh = CacheEntry::new(json!("y".repeat(60)), fx.clock.now_millis(), Duration::from_secs(10));
        let outcome = fx.store.put("fresh", &fresh).await.unwrap();

        assert!(matches!(outcome, PutOutcome::Stored { evicted } if evicted >= 1));
        assert!(fx.store.get("fresh").await.is_some());
        assert!(fx.memory.len() < 3);
    }

    #[tokio::test]
    async fn test_write_dropped_when_nothing_to_evict() {
        let fx = fixture(40).await;
        let entry = CacheEntry::new(json!("z".repeat(100)), fx.clock.now_millis(), Duration::from_secs(1));
        let outcome = fx.store.put("big", &entry).await;
        assert_eq!(outcome, Some(PutOutcome::Dropped { evicted: 0 }));
        assert!(fx.store.get("big").await.is_none());
    }

    #[tokio::test]
    async fn test_index_write_failure_rolls_back_entry() {
        let entry = CacheEntry::new(json!("v"), 100_000, Duration::from_secs(10));
        let payload = serde_json::to_string(&entry).unwrap();
        // Room for the entry, not for the index that would list it
        let quota = ("cache_k".len() + payload.len() + 10) as u64;
        let fx = fixture(quota).await;

        let outcome = fx.store.put("k", &entry).await;
        assert_eq!(outcome, Some(PutOutcome::Dropped { evicted: 0 }));
        assert!(fx.medium.raw_value("cache_k").is_none());
        assert!(index_of(&fx.medium).is_empty());
        assert!(fx.store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_discard_skips_replaced_value() {
        let fx = fixture(10_000).await;
        let old = CacheEntry::new(json!("old"), fx.clock.now_millis(), Duration::from_secs(10));
        fx.store.put("k", &old).await;
        let observed = fx.medium.raw_value("cache_k").unwrap();

        let fresh = CacheEntry::new(json!("fresh"), fx.clock.now_millis(), Duration::from_secs(10));
        fx.store.put("k", &fresh).await;

        let DurableStore::Available(handle) = &fx.store else {
            panic!("durable store should be available");
        };
        assert!(!handle.discard("k", observed).await);
        assert_eq!(fx.store.get("k").await, Some(fresh));
        assert_eq!(index_of(&fx.medium), vec!["cache_k".to_string()]);

        let current = fx.medium.raw_value("cache_k").unwrap();
        assert!(handle.discard("k", current).await);
        assert!(fx.medium.raw_value("cache_k").is_none());
        assert!(index_of(&fx.medium).is_empty());
    }

    #[tokio::test]
    async fn test_rehydrate_filters_namespace_and_expiry() {
        let fx = fixture(10_000).await;
        let now = fx.clock.now_millis();
        let live = CacheEntry::new(json!("a"), now, Duration::from_secs(60));
        let short = CacheEntry::new(json!("b"), now, Duration::from_millis(10));

        fx.store.put("user_a_live", &live).await;
        fx.store.put("user_a_short", &short).await;
        fx.store.put("user_b_other", &live).await;
        fx.clock.advance(Duration::from_millis(20));

        let loaded = fx.store.rehydrate(Namespace::for_identity("a")).await;
        assert_eq!(loaded, vec![("user_a_live".to_string(), live)]);

        let index = index_of(&fx.medium);
        assert!(!index.contains(&"cache_user_a_short".to_string()));
        assert!(index.contains(&"cache_user_b_other".to_string()));
    }

    #[tokio::test]
    async fn test_sweep_scope() {
        let fx = fixture(10_000).await;
        let entry = CacheEntry::new(json!(1), fx.clock.now_millis(), Duration::from_secs(60));
        fx.store.put("user_a_orders", &entry).await;
        fx.store.put("user_a_widgets", &entry).await;
        fx.store.put("user_b_orders", &entry).await;

        let removed = fx.store.sweep(KeyScope::all(Namespace::for_identity("a"))).await;
        assert_eq!(removed, 2);
        assert_eq!(index_of(&fx.medium), vec!["cache_user_b_orders".to_string()]);
    }

    #[tokio::test]
    async fn test_degraded_when_probe_fails() {
        let memory = MemoryStore::new(Arc::new(ManualClock::new(0)), 0.5);
        let store = DurableStore::open(
            Some(Arc::new(MemoryMedium::unavailable())),
            KeyLayout::new("cache_", "cache-index"),
            memory,
            Arc::new(ManualClock::new(0)),
            EvictionPolicy::default(),
        )
        .await;

        assert!(!store.is_available());
        let entry = CacheEntry::new(json!(1), 0, Duration::from_secs(1));
        assert!(store.put("k", &entry).await.is_none());
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_skipped() {
        let fx = fixture(10_000).await;
        fx.store.shutdown().await;
        let entry = CacheEntry::new(json!(1), 0, Duration::from_secs(1));
        assert!(fx.store.put("k", &entry).await.is_none());
    }
}
