//! # tiercache
//!
//! Client-embedded data cache with a volatile and a durable tier.
//!
//! - **TTL & staleness**: entries expire after their TTL and are refreshed in
//!   the background once past a fraction of it
//! - **Identity isolation**: keys are namespaced per authenticated identity
//! - **Durability**: entries survive restarts through a quota-limited medium
//!   and are rehydrated for the active identity on open
//! - **Eviction**: quota exhaustion reclaims the oldest half-expired entries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiercache::{CacheConfig, DataCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cache = DataCache::open(CacheConfig::default()).await?;
//!
//!     let key = cache
//!         .generate_key("orders", Some(&serde_json::json!({"page": 1})))
//!         .await;
//!     let orders: Vec<String> = cache
//!         .cache_first_with_refresh(
//!             key,
//!             || async { Ok::<_, std::io::Error>(vec!["o-1".to_string()]) },
//!             None,
//!             None,
//!         )
//!         .await?;
//!     println!("{orders:?}");
//!
//!     cache.close().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod identity;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use cache::{DataCache, DataCacheBuilder, EvictionPolicy, InvalidationPattern};
pub use config::{CacheConfig, LoggingConfig, StorageBackend, StorageConfig};
pub use core::{
    CacheEntry, CacheError, CacheKey, CacheStats, Clock, IdentityError, ManualClock, Result,
    StorageError, SystemClock,
};
pub use identity::{IdentityProvider, IdentityResolver, Namespace, StaticIdentity};
pub use storage::{FileMedium, MemoryMedium, StorageMedium};
