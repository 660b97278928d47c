use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::market_data_model::{DataSource, PriceSeries};
use crate::errors::Result;
use crate::utils::time_utils::get_days_between;

/// Resolves day-level unit prices. Implemented outside this crate on top of
/// whatever quote store or provider the application uses.
#[async_trait]
pub trait MarketPriceResolverTrait: Send + Sync {
    /// Closing price of `symbol` on `date`, `None` when none is known.
    async fn get_price(
        &self,
        symbol: &str,
        data_source: &DataSource,
        date: NaiveDate,
    ) -> Result<Option<Decimal>>;

    /// All known prices of `symbol` in `[start_date, end_date]`.
    ///
    /// The default asks for every day individually; resolvers backed by a
    /// range query should override it.
    async fn get_prices(
        &self,
        symbol: &str,
        data_source: &DataSource,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries> {
        let mut series = PriceSeries::default();
        for date in get_days_between(start_date, end_date) {
            if let Some(price) = self.get_price(symbol, data_source, date).await? {
                series.insert(date, price);
            }
        }
        Ok(series)
    }
}
