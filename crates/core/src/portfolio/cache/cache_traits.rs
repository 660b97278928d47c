use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;
use crate::portfolio::snapshot::PortfolioSnapshot;

/// Storage of finished snapshots keyed by fingerprint.
#[async_trait]
pub trait CacheStoreTrait: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Result<Option<Arc<PortfolioSnapshot>>>;

    /// Stores `snapshot` until `ttl` has elapsed.
    async fn set(
        &self,
        fingerprint: &str,
        snapshot: Arc<PortfolioSnapshot>,
        ttl: Duration,
    ) -> Result<()>;

    async fn remove(&self, fingerprint: &str) -> Result<()>;
}
