use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::activities::ActivityRepositoryTrait;
use crate::config::EngineConfig;
use crate::errors::{Result, ValidationError};
use crate::fx::{normalize_currency_code, ExchangeRateResolverTrait};
use crate::market_data::MarketPriceResolverTrait;
use crate::portfolio::cache::{snapshot_fingerprint, CacheStoreTrait, SnapshotCache};
use crate::portfolio::portfolio_model::SnapshotRequest;
use crate::portfolio::snapshot::{PortfolioSnapshot, SnapshotAssembler, SnapshotInput};

#[async_trait]
pub trait PortfolioServiceTrait: Send + Sync {
    /// Cached snapshot of the request, built on a miss.
    async fn get_snapshot(&self, request: SnapshotRequest) -> Result<Arc<PortfolioSnapshot>>;

    async fn invalidate_snapshot(&self, request: &SnapshotRequest) -> Result<()>;

    async fn invalidate_user(&self, user_id: &str) -> Result<()>;
}

pub struct PortfolioService {
    activity_repository: Arc<dyn ActivityRepositoryTrait>,
    assembler: Arc<SnapshotAssembler>,
    cache: SnapshotCache,
}

impl PortfolioService {
    pub fn new(
        activity_repository: Arc<dyn ActivityRepositoryTrait>,
        price_resolver: Arc<dyn MarketPriceResolverTrait>,
        rate_resolver: Arc<dyn ExchangeRateResolverTrait>,
        cache_store: Arc<dyn CacheStoreTrait>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let cache = SnapshotCache::new(cache_store, &config.cache);
        Ok(Self {
            activity_repository,
            assembler: Arc::new(SnapshotAssembler::new(price_resolver, rate_resolver, config)),
            cache,
        })
    }

    /// Checks the request and trims the user id, so the same user always reads
    /// and caches under one id.
    fn normalize_request(mut request: SnapshotRequest) -> Result<SnapshotRequest> {
        request.user_id = request.user_id.trim().to_string();
        if request.user_id.is_empty() {
            return Err(ValidationError::MissingField("userId".to_string()).into());
        }
        if normalize_currency_code(&request.base_currency).is_empty() {
            return Err(ValidationError::MissingField("baseCurrency".to_string()).into());
        }
        Ok(request)
    }

    fn fingerprint(&self, request: &SnapshotRequest) -> Result<String> {
        let data_version = self.activity_repository.get_data_version(&request.user_id)?;
        snapshot_fingerprint(request, &data_version)
    }
}

#[async_trait]
impl PortfolioServiceTrait for PortfolioService {
    async fn get_snapshot(&self, request: SnapshotRequest) -> Result<Arc<PortfolioSnapshot>> {
        let request = Self::normalize_request(request)?;
        let fingerprint = self.fingerprint(&request)?;
        debug!(
            "Snapshot requested by {} ({} {} {}): {}",
            request.user_id, request.base_currency, request.range, request.method, fingerprint
        );

        let repository = Arc::clone(&self.activity_repository);
        let assembler = Arc::clone(&self.assembler);
        let user_id = request.user_id.clone();

        self.cache
            .get_or_build(&user_id, &fingerprint, move || async move {
                let filter = request.filter.normalize();
                let activities = repository
                    .get_activities(&request.user_id, &filter)?
                    .into_iter()
                    .filter(|activity| filter.matches(activity))
                    .collect();
                let cash_balances = repository
                    .get_cash_balances(&request.user_id, &filter)?
                    .into_iter()
                    .filter(|balance| filter.matches_account(&balance.account_id))
                    .collect();

                assembler
                    .assemble(SnapshotInput {
                        base_currency: request.base_currency,
                        range: request.range,
                        end_date: request.end_date,
                        method: request.method,
                        activities,
                        cash_balances,
                    })
                    .await
            })
            .await
    }

    async fn invalidate_snapshot(&self, request: &SnapshotRequest) -> Result<()> {
        let request = Self::normalize_request(request.clone())?;
        let fingerprint = self.fingerprint(&request)?;
        self.cache.invalidate(&fingerprint).await
    }

    async fn invalidate_user(&self, user_id: &str) -> Result<()> {
        self.cache.invalidate_user(user_id.trim()).await
    }
}
