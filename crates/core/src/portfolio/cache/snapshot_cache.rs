use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::cache_traits::CacheStoreTrait;
use crate::config::CacheConfig;
use crate::errors::{CacheError, Error, Result};
use crate::portfolio::snapshot::PortfolioSnapshot;

type BuildOutcome = std::result::Result<Arc<PortfolioSnapshot>, Arc<Error>>;
type InFlightBuild = Shared<BoxFuture<'static, BuildOutcome>>;
/// Fingerprints of one user with the instant their stored entry expires.
type UserFingerprints = HashMap<String, Instant>;

/// Snapshot cache with single-flight builds.
///
/// Concurrent requests for the same fingerprint wait on one build and
/// receive the same `Arc`. Builds run on their own task, so they finish (or
/// hit the time budget) even when every waiter goes away. Successful builds
/// are stored with the configured TTL; failures and timeouts reach every
/// waiter and are not stored.
pub struct SnapshotCache {
    store: Arc<dyn CacheStoreTrait>,
    in_flight: Arc<DashMap<String, InFlightBuild>>,
    /// Live fingerprints per user, for per-user invalidation.
    user_index: Arc<DashMap<String, UserFingerprints>>,
    ttl: Duration,
    build_timeout_ms: u64,
}

/// Clears the in-flight entry when the build task ends, however it ends.
struct InFlightGuard {
    in_flight: Arc<DashMap<String, InFlightBuild>>,
    fingerprint: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.fingerprint);
    }
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn CacheStoreTrait>, config: &CacheConfig) -> Self {
        Self {
            store,
            in_flight: Arc::new(DashMap::new()),
            user_index: Arc::new(DashMap::new()),
            ttl: config.ttl(),
            build_timeout_ms: config.build_timeout_ms,
        }
    }

    /// Returns the stored snapshot for `fingerprint`, joins a running build of
    /// it, or starts one with `build`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn get_or_build<F, Fut>(
        &self,
        user_id: &str,
        fingerprint: &str,
        build: F,
    ) -> Result<Arc<PortfolioSnapshot>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PortfolioSnapshot>> + Send + 'static,
    {
        if let Some(snapshot) = self.store.get(fingerprint).await? {
            debug!("Snapshot cache hit for {}", fingerprint);
            return Ok(snapshot);
        }

        let in_flight = match self.in_flight.entry(fingerprint.to_string()) {
            Entry::Occupied(entry) => {
                debug!("Joining in-flight snapshot build {}", fingerprint);
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                debug!("Snapshot cache miss for {}, building", fingerprint);
                let task = tokio::spawn(self.run_build(user_id, fingerprint, build()));
                let task_fingerprint = fingerprint.to_string();
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        error!("Snapshot build task {} failed: {}", task_fingerprint, e);
                        Err(Arc::new(Error::Unexpected(format!(
                            "snapshot build task {} failed: {}",
                            task_fingerprint, e
                        ))))
                    })
                }
                .boxed()
                .shared();
                entry.insert(shared.clone());
                shared
            }
        };

        in_flight.await.map_err(Error::Shared)
    }

    /// Wraps `build` with the time budget and stores its result. The
    /// in-flight entry is cleared when the returned future completes or is
    /// dropped.
    fn run_build<Fut>(
        &self,
        user_id: &str,
        fingerprint: &str,
        build: Fut,
    ) -> impl Future<Output = BuildOutcome> + Send + 'static
    where
        Fut: Future<Output = Result<PortfolioSnapshot>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let user_index = Arc::clone(&self.user_index);
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            fingerprint: fingerprint.to_string(),
        };
        let ttl = self.ttl;
        let budget_ms = self.build_timeout_ms;
        let user_id = user_id.to_string();
        let fingerprint = fingerprint.to_string();

        async move {
            let _guard = guard;
            match tokio::time::timeout(Duration::from_millis(budget_ms), build).await {
                Ok(Ok(snapshot)) => {
                    let snapshot = Arc::new(snapshot);
                    match store.set(&fingerprint, Arc::clone(&snapshot), ttl).await {
                        Ok(()) => index_fingerprint(&user_index, user_id, fingerprint, ttl),
                        Err(e) => warn!("Snapshot {} built but not stored: {}", fingerprint, e),
                    }
                    Ok(snapshot)
                }
                Ok(Err(e)) => {
                    warn!("Snapshot build {} failed: {}", fingerprint, e);
                    Err(Arc::new(e))
                }
                Err(_) => {
                    warn!(
                        "Snapshot build {} exceeded its {} ms budget",
                        fingerprint, budget_ms
                    );
                    Err(Arc::new(Error::Cache(CacheError::Timeout {
                        fingerprint,
                        budget_ms,
                    })))
                }
            }
        }
    }

    /// Number of builds currently running.
    pub fn in_flight_builds(&self) -> usize {
        self.in_flight.len()
    }

    /// Number of fingerprints currently indexed for `user_id`.
    pub fn indexed_snapshots(&self, user_id: &str) -> usize {
        self.user_index
            .get(user_id)
            .map_or(0, |fingerprints| fingerprints.len())
    }

    pub async fn invalidate(&self, fingerprint: &str) -> Result<()> {
        self.store.remove(fingerprint).await?;
        for mut fingerprints in self.user_index.iter_mut() {
            fingerprints.remove(fingerprint);
        }
        debug!("Invalidated snapshot {}", fingerprint);
        Ok(())
    }

    /// Drops every stored snapshot of `user_id`.
    pub async fn invalidate_user(&self, user_id: &str) -> Result<()> {
        let fingerprints = self
            .user_index
            .remove(user_id)
            .map(|(_, fingerprints)| fingerprints)
            .unwrap_or_default();
        for fingerprint in fingerprints.keys() {
            self.store.remove(fingerprint).await?;
        }
        info!(
            "Invalidated {} cached snapshots of user {}",
            fingerprints.len(),
            user_id
        );
        Ok(())
    }
}

/// Records a stored fingerprint and drops index entries whose TTL has passed.
fn index_fingerprint(
    user_index: &DashMap<String, UserFingerprints>,
    user_id: String,
    fingerprint: String,
    ttl: Duration,
) {
    let now = Instant::now();
    user_index.retain(|_, fingerprints| {
        fingerprints.retain(|_, expires| *expires > now);
        !fingerprints.is_empty()
    });
    user_index
        .entry(user_id)
        .or_default()
        .insert(fingerprint, now + ttl);
}
