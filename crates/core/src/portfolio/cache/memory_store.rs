//! In-memory snapshot store with per-entry TTL using moka

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cache_traits::CacheStoreTrait;
use crate::errors::Result;
use crate::portfolio::snapshot::PortfolioSnapshot;

#[derive(Clone)]
struct StoredSnapshot {
    snapshot: Arc<PortfolioSnapshot>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was stored with.
struct StoredTtl;

impl Expiry<String, StoredSnapshot> for StoredTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredSnapshot,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Process-local [`CacheStoreTrait`] implementation.
pub struct MemoryCacheStore {
    cache: Cache<String, StoredSnapshot>,
}

impl MemoryCacheStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(StoredTtl)
                .build(),
        }
    }
}

#[async_trait]
impl CacheStoreTrait for MemoryCacheStore {
    async fn get(&self, fingerprint: &str) -> Result<Option<Arc<PortfolioSnapshot>>> {
        Ok(self.cache.get(fingerprint).await.map(|stored| stored.snapshot))
    }

    async fn set(
        &self,
        fingerprint: &str,
        snapshot: Arc<PortfolioSnapshot>,
        ttl: Duration,
    ) -> Result<()> {
        self.cache
            .insert(fingerprint.to_string(), StoredSnapshot { snapshot, ttl })
            .await;
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<()> {
        self.cache.invalidate(fingerprint).await;
        Ok(())
    }
}
