//! Cache Module
//!
//! Provides the caller-facing layer over the two storage tiers:
//! - Service: stale-while-revalidate reads, writes, lifecycle
//! - Invalidation: identity-scoped removal by name or pattern
//! - Eviction: reclaiming durable quota under pressure

pub mod eviction;
pub mod invalidation;
pub mod service;

pub use eviction::EvictionPolicy;
pub use invalidation::{InvalidationPattern, KeyScope};
pub use service::{DataCache, DataCacheBuilder};
