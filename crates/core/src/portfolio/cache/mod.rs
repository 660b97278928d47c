//! Snapshot cache - fingerprints, stores and single-flight builds.

mod cache_traits;
mod fingerprint;
mod memory_store;
mod snapshot_cache;

pub use cache_traits::CacheStoreTrait;
pub use fingerprint::snapshot_fingerprint;
pub use memory_store::MemoryCacheStore;
pub use snapshot_cache::SnapshotCache;
