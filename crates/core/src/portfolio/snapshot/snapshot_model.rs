use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::market_data::DataSource;
use crate::portfolio::metrics::{DateRange, SymbolError, SymbolMetrics};
use crate::portfolio::performance::ReturnMethod;
use crate::utils::decimal_utils::round_output;

/// One holding as of the end date. Amounts without suffix are in the
/// instrument currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePosition {
    pub symbol: String,
    pub data_source: DataSource,
    pub currency: String,
    pub asset_class: Option<String>,
    pub is_valuable: bool,
    pub quantity: Decimal,
    pub market_price: Decimal,
    pub average_price: Decimal,
    pub exchange_rate: Decimal,
    pub first_buy_date: Option<NaiveDate>,
    pub transaction_count: usize,
    pub current_value: Decimal,
    pub value_in_base_currency: Decimal,
    pub investment: Decimal,
    pub investment_with_currency_effect: Decimal,
    pub gross_performance: Decimal,
    pub gross_performance_percentage: Decimal,
    pub gross_performance_with_currency_effect: Decimal,
    pub gross_performance_percentage_with_currency_effect: Decimal,
    pub net_performance: Decimal,
    pub net_performance_percentage: Decimal,
    pub net_performance_with_currency_effect: Decimal,
    pub net_performance_percentage_with_currency_effect: Decimal,
    pub time_weighted_investment: Decimal,
    pub time_weighted_investment_with_currency_effect: Decimal,
    pub time_weighted_performance_with_currency_effect: Decimal,
    pub fees_with_currency_effect: Decimal,
    pub dividend_with_currency_effect: Decimal,
    pub interest_with_currency_effect: Decimal,
    pub realized_performance_with_currency_effect: Decimal,
    pub net_performance_percentage_by_range_with_currency_effect: BTreeMap<DateRange, Decimal>,
    pub has_errors: bool,
}

impl From<&SymbolMetrics> for TimelinePosition {
    fn from(m: &SymbolMetrics) -> Self {
        Self {
            symbol: m.symbol.clone(),
            data_source: m.data_source.clone(),
            currency: m.currency.clone(),
            asset_class: m.asset_class.clone(),
            is_valuable: m.is_valuable,
            quantity: m.quantity,
            market_price: round_output(m.market_price),
            average_price: round_output(m.average_price),
            exchange_rate: round_output(m.exchange_rate),
            first_buy_date: m.first_buy_date,
            transaction_count: m.transaction_count,
            current_value: round_output(m.current_value),
            value_in_base_currency: round_output(m.current_value_with_currency_effect),
            investment: round_output(m.total_investment),
            investment_with_currency_effect: round_output(m.total_investment_with_currency_effect),
            gross_performance: round_output(m.gross_performance),
            gross_performance_percentage: round_output(m.gross_performance_percentage),
            gross_performance_with_currency_effect: round_output(
                m.gross_performance_with_currency_effect,
            ),
            gross_performance_percentage_with_currency_effect: round_output(
                m.gross_performance_percentage_with_currency_effect,
            ),
            net_performance: round_output(m.net_performance),
            net_performance_percentage: round_output(m.net_performance_percentage),
            net_performance_with_currency_effect: round_output(
                m.net_performance_with_currency_effect,
            ),
            net_performance_percentage_with_currency_effect: round_output(
                m.net_performance_percentage_with_currency_effect,
            ),
            time_weighted_investment: round_output(m.time_weighted_investment),
            time_weighted_investment_with_currency_effect: round_output(
                m.time_weighted_investment_with_currency_effect,
            ),
            time_weighted_performance_with_currency_effect: round_output(
                m.time_weighted_performance_with_currency_effect,
            ),
            fees_with_currency_effect: round_output(m.total_fees_with_currency_effect),
            dividend_with_currency_effect: round_output(m.total_dividend_with_currency_effect),
            interest_with_currency_effect: round_output(m.total_interest_with_currency_effect),
            realized_performance_with_currency_effect: round_output(
                m.realized_performance_with_currency_effect,
            ),
            net_performance_percentage_by_range_with_currency_effect: m
                .net_performance_percentage_by_range_with_currency_effect
                .iter()
                .map(|(range, value)| (*range, round_output(*value)))
                .collect(),
            has_errors: m.has_errors,
        }
    }
}

/// Portfolio totals of one day, in the base currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalDataItem {
    pub date: NaiveDate,
    /// Positions plus current cash minus liabilities.
    pub net_worth: Decimal,
    pub value_with_currency_effect: Decimal,
    pub total_investment_with_currency_effect: Decimal,
    /// Net amount invested on this day.
    pub investment_value_with_currency_effect: Decimal,
    /// Since the range start.
    pub net_performance_with_currency_effect: Decimal,
    pub net_performance_in_percentage_with_currency_effect: Decimal,
    pub time_weighted_performance_with_currency_effect: Decimal,
}

/// Portfolio-level result of one calculation. Contains no timestamps, so
/// identical inputs give identical snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub base_currency: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub method: ReturnMethod,
    /// Differs from `method` when the requested method could not be computed.
    pub effective_method: ReturnMethod,
    pub fallback_reason: Option<String>,

    pub current_value_in_base_currency: Decimal,
    pub total_investment: Decimal,
    pub total_investment_with_currency_effect: Decimal,
    pub gross_performance: Decimal,
    pub gross_performance_with_currency_effect: Decimal,
    pub gross_performance_percentage: Decimal,
    pub gross_performance_percentage_with_currency_effect: Decimal,
    pub net_performance: Decimal,
    pub net_performance_with_currency_effect: Decimal,
    pub net_performance_percentage: Decimal,
    pub net_performance_percentage_with_currency_effect: Decimal,
    pub currency_effect: Decimal,
    pub net_annualized_performance: Decimal,
    pub net_annualized_performance_with_currency_effect: Decimal,

    pub total_fees_with_currency_effect: Decimal,
    pub total_interest_with_currency_effect: Decimal,
    pub total_dividend_with_currency_effect: Decimal,
    pub total_valuables_with_currency_effect: Decimal,
    pub total_liabilities_with_currency_effect: Decimal,
    pub cash_balance_in_base_currency: Decimal,
    pub realized_performance_with_currency_effect: Decimal,

    pub net_performance_by_range_with_currency_effect: BTreeMap<DateRange, Decimal>,
    pub net_performance_percentage_by_range_with_currency_effect: BTreeMap<DateRange, Decimal>,

    pub positions: Vec<TimelinePosition>,
    pub historical_data: Vec<HistoricalDataItem>,

    pub has_errors: bool,
    pub errors: Vec<SymbolError>,
}

impl PortfolioSnapshot {
    pub fn position(&self, symbol: &str) -> Option<&TimelinePosition> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }
}
