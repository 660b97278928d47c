use async_trait::async_trait;
use chrono::NaiveDate;

use super::fx_model::ExchangeRateSeries;
use crate::errors::Result;

/// Supplies exchange rates for a whole calculation at once.
#[async_trait]
pub trait ExchangeRateResolverTrait: Send + Sync {
    /// Rates converting each of `currencies` into `base_currency` for every
    /// known date in `[start_date, end_date]`. Dates before `start_date` may be
    /// included so that lookups at the range start have a prior rate.
    async fn get_rates(
        &self,
        base_currency: &str,
        currencies: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<ExchangeRateSeries>;
}
