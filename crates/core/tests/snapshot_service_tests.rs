//! End-to-end tests of the public snapshot API with in-memory collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::sync::Arc;

use folio_core::activities::{Activity, ActivityRepositoryTrait, ActivityType, SymbolProfile};
use folio_core::fx::{ExchangeRateResolverTrait, ExchangeRateSeries};
use folio_core::market_data::{DataSource, MarketPriceResolverTrait};
use folio_core::{
    CashBalance, DateRange, EngineConfig, MemoryCacheStore, PortfolioFilter, PortfolioService,
    PortfolioServiceTrait, ReturnMethod, Result, SnapshotRequest,
};

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

struct InMemoryActivities {
    activities: Vec<Activity>,
}

impl ActivityRepositoryTrait for InMemoryActivities {
    fn get_activities(&self, _user_id: &str, _filter: &PortfolioFilter) -> Result<Vec<Activity>> {
        Ok(self.activities.clone())
    }

    fn get_cash_balances(&self, _user_id: &str, _filter: &PortfolioFilter) -> Result<Vec<CashBalance>> {
        Ok(vec![CashBalance {
            account_id: "broker".to_string(),
            currency: "EUR".to_string(),
            balance: dec!(1000),
        }])
    }

    fn get_data_version(&self, _user_id: &str) -> Result<String> {
        Ok("42".to_string())
    }
}

/// Linear prices: 100 on Jan 1, 0.1 more every day.
struct LinearPrices;

#[async_trait]
impl MarketPriceResolverTrait for LinearPrices {
    async fn get_price(
        &self,
        _symbol: &str,
        _data_source: &DataSource,
        date: NaiveDate,
    ) -> Result<Option<Decimal>> {
        let days = (date - day(1, 1)).num_days();
        Ok((days >= 0).then(|| Decimal::new(1000 + days, 1)))
    }
}

/// EUR at 1.10 USD throughout.
struct FixedRates;

#[async_trait]
impl ExchangeRateResolverTrait for FixedRates {
    async fn get_rates(
        &self,
        base_currency: &str,
        currencies: &[String],
        start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<ExchangeRateSeries> {
        let mut rates = BTreeMap::new();
        rates.insert(start_date, dec!(1.10));
        Ok(ExchangeRateSeries::with_rates(
            base_currency,
            currencies
                .iter()
                .map(|currency| (currency.clone(), rates.clone()))
                .collect(),
        ))
    }
}

fn trade(id: &str, activity_type: ActivityType, date: NaiveDate, quantity: Decimal, price: Decimal) -> Activity {
    Activity {
        id: id.to_string(),
        account_id: "broker".to_string(),
        activity_type,
        symbol_profile: Some(SymbolProfile {
            symbol: "VWRL".to_string(),
            data_source: DataSource::Yahoo,
            currency: "EUR".to_string(),
            asset_class: Some("ETF".to_string()),
        }),
        date,
        quantity,
        unit_price: price,
        fee: dec!(2),
        currency: "EUR".to_string(),
    }
}

fn service() -> PortfolioService {
    let activities = vec![
        trade("b1", ActivityType::Buy, day(1, 1), dec!(10), dec!(100)),
        trade("b2", ActivityType::Buy, day(2, 1), dec!(10), dec!(103.1)),
        trade("s1", ActivityType::Sell, day(3, 1), dec!(5), dec!(106)),
        trade("d1", ActivityType::Dividend, day(3, 15), dec!(15), dec!(0.5)),
    ];
    PortfolioService::new(
        Arc::new(InMemoryActivities { activities }),
        Arc::new(LinearPrices),
        Arc::new(FixedRates),
        Arc::new(MemoryCacheStore::new(16)),
        EngineConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn snapshots_are_idempotent_across_services() {
    let request = SnapshotRequest::new("user", "USD", day(3, 31)).with_range(DateRange::YearToDate);

    let first = service().get_snapshot(request.clone()).await.unwrap();
    let second = service().get_snapshot(request).await.unwrap();

    assert_eq!(*first, *second);
    assert_eq!(
        serde_json::to_vec(&*first).unwrap(),
        serde_json::to_vec(&*second).unwrap()
    );
}

#[tokio::test]
async fn snapshot_reports_holdings_in_base_currency() {
    let snapshot = service()
        .get_snapshot(SnapshotRequest::new("user", "USD", day(3, 31)))
        .await
        .unwrap();

    assert!(!snapshot.has_errors, "{:?}", snapshot.errors);
    let position = snapshot.position("VWRL").unwrap();
    assert_eq!(position.quantity, dec!(15));
    // Mar 31 is day 90 of 2024
    assert_eq!(position.market_price, dec!(109));
    assert_eq!(position.value_in_base_currency, dec!(1798.5));
    assert_eq!(snapshot.cash_balance_in_base_currency, dec!(1100));
    assert_eq!(snapshot.current_value_in_base_currency, dec!(2898.5));
    assert_eq!(snapshot.total_dividend_with_currency_effect, dec!(8.25));
    assert!(snapshot.realized_performance_with_currency_effect > Decimal::ZERO);
    assert!(snapshot.net_performance_percentage_with_currency_effect > Decimal::ZERO);
    assert_eq!(snapshot.historical_data.len(), 91);
}

#[tokio::test]
async fn every_method_yields_a_snapshot() {
    for method in [
        ReturnMethod::TimeWeighted,
        ReturnMethod::MoneyWeighted,
        ReturnMethod::ReturnOnInvestment,
        ReturnMethod::ReturnOnAverageInvestment,
    ] {
        let snapshot = service()
            .get_snapshot(SnapshotRequest::new("user", "USD", day(3, 31)).with_method(method))
            .await
            .unwrap();
        assert_eq!(snapshot.method, method);
        assert_eq!(snapshot.effective_method, method);
        assert!(snapshot.net_performance_percentage > Decimal::ZERO);
    }
}
