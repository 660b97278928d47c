use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::ValidationError;
use crate::market_data::DataSource;
use crate::utils::time_utils::{start_of_month, start_of_week, start_of_year, years_before};

/// Named reporting window ending at the calculation end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum DateRange {
    OneDay,
    WeekToDate,
    MonthToDate,
    YearToDate,
    OneYear,
    FiveYears,
    #[default]
    Max,
    /// A calendar year, cut at the end date when it is the current one.
    Year(i32),
}

impl DateRange {
    /// The fixed windows plus every calendar year from `first_date` to `end_date`.
    pub fn standard_ranges(end_date: NaiveDate, first_date: Option<NaiveDate>) -> Vec<DateRange> {
        let mut ranges = vec![
            DateRange::OneDay,
            DateRange::WeekToDate,
            DateRange::MonthToDate,
            DateRange::YearToDate,
            DateRange::OneYear,
            DateRange::FiveYears,
            DateRange::Max,
        ];
        if let Some(first) = first_date.filter(|first| *first <= end_date) {
            ranges.extend((first.year()..=end_date.year()).map(DateRange::Year));
        }
        ranges
    }

    /// Inclusive `[start, end]` of the window, clamped to start no earlier than
    /// `first_date`. `None` when the window is empty.
    pub fn interval(
        &self,
        end_date: NaiveDate,
        first_date: Option<NaiveDate>,
    ) -> Option<(NaiveDate, NaiveDate)> {
        let first = first_date.filter(|first| *first <= end_date);
        let (start, end) = match self {
            DateRange::OneDay => (end_date, end_date),
            DateRange::WeekToDate => (start_of_week(end_date), end_date),
            DateRange::MonthToDate => (start_of_month(end_date), end_date),
            DateRange::YearToDate => (start_of_year(end_date), end_date),
            DateRange::OneYear => (years_before(end_date, 1), end_date),
            DateRange::FiveYears => (years_before(end_date, 5), end_date),
            DateRange::Max => (first.unwrap_or(end_date), end_date),
            DateRange::Year(year) => {
                let start = NaiveDate::from_ymd_opt(*year, 1, 1)?;
                let end = NaiveDate::from_ymd_opt(*year, 12, 31)?.min(end_date);
                (start, end)
            }
        };
        let start = match first {
            Some(first) if first > start => first,
            _ => start,
        };
        (start <= end).then_some((start, end))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::OneDay => f.write_str("1d"),
            DateRange::WeekToDate => f.write_str("wtd"),
            DateRange::MonthToDate => f.write_str("mtd"),
            DateRange::YearToDate => f.write_str("ytd"),
            DateRange::OneYear => f.write_str("1y"),
            DateRange::FiveYears => f.write_str("5y"),
            DateRange::Max => f.write_str("max"),
            DateRange::Year(year) => write!(f, "{}", year),
        }
    }
}

impl FromStr for DateRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(DateRange::OneDay),
            "wtd" => Ok(DateRange::WeekToDate),
            "mtd" => Ok(DateRange::MonthToDate),
            "ytd" => Ok(DateRange::YearToDate),
            "1y" => Ok(DateRange::OneYear),
            "5y" => Ok(DateRange::FiveYears),
            "max" => Ok(DateRange::Max),
            other => other
                .parse::<i32>()
                .ok()
                .filter(|year| (1900..=9999).contains(year))
                .map(DateRange::Year)
                .ok_or_else(|| {
                    ValidationError::InvalidInput(format!("Unknown date range: {}", s))
                }),
        }
    }
}

impl Serialize for DateRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Data problem of one symbol. The symbol stays in the snapshot unless the
/// kind is `Integrity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SymbolErrorKind {
    /// No price on or before the date; the latest trade price was used.
    #[serde(rename_all = "camelCase")]
    MissingMarketPrice { date: NaiveDate },
    /// Prices were carried forward from an old date.
    #[serde(rename_all = "camelCase")]
    StaleMarketPrice { last_price_date: NaiveDate },
    /// No rate for the currency; amounts were taken at 1.
    #[serde(rename_all = "camelCase")]
    MissingExchangeRate { currency: String },
    /// The chained time-weighted factor left the decimal range; it keeps the
    /// last representable value from this date on.
    #[serde(rename_all = "camelCase")]
    CalculationOverflow { date: NaiveDate },
    /// The activity history is inconsistent; the symbol is excluded.
    Integrity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolError {
    pub symbol: String,
    pub data_source: DataSource,
    #[serde(flatten)]
    pub kind: SymbolErrorKind,
    pub message: String,
}

impl SymbolError {
    pub fn new(symbol: &str, data_source: DataSource, kind: SymbolErrorKind, message: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            data_source,
            kind,
            message,
        }
    }

    pub fn is_integrity(&self) -> bool {
        self.kind == SymbolErrorKind::Integrity
    }
}

/// Day-indexed series and range totals of one symbol.
///
/// Series are cumulative since the first activity and cover every day from
/// the earlier of the first activity and the range start through the end
/// date. Scalars without a date qualifier refer to the requested range.
/// `_with_currency_effect` amounts are in the base currency with each
/// investment converted at its trade-date rate; the others are in the
/// instrument currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMetrics {
    pub symbol: String,
    pub data_source: DataSource,
    pub currency: String,
    pub asset_class: Option<String>,
    pub is_valuable: bool,

    pub quantity: Decimal,
    pub market_price: Decimal,
    pub average_price: Decimal,
    /// Instrument to base currency rate at the end date.
    pub exchange_rate: Decimal,
    pub first_buy_date: Option<NaiveDate>,
    pub transaction_count: usize,

    pub current_value: Decimal,
    pub current_value_with_currency_effect: Decimal,
    pub total_investment: Decimal,
    pub total_investment_with_currency_effect: Decimal,
    pub initial_value: Decimal,
    pub initial_value_with_currency_effect: Decimal,

    pub gross_performance: Decimal,
    pub gross_performance_with_currency_effect: Decimal,
    pub gross_performance_percentage: Decimal,
    pub gross_performance_percentage_with_currency_effect: Decimal,
    pub net_performance: Decimal,
    pub net_performance_with_currency_effect: Decimal,
    pub net_performance_percentage: Decimal,
    pub net_performance_percentage_with_currency_effect: Decimal,
    pub time_weighted_performance: Decimal,
    pub time_weighted_performance_with_currency_effect: Decimal,
    pub time_weighted_investment: Decimal,
    pub time_weighted_investment_with_currency_effect: Decimal,

    pub total_fees: Decimal,
    pub total_fees_with_currency_effect: Decimal,
    pub total_dividend: Decimal,
    pub total_dividend_with_currency_effect: Decimal,
    pub total_interest: Decimal,
    pub total_interest_with_currency_effect: Decimal,
    pub realized_performance: Decimal,
    pub realized_performance_with_currency_effect: Decimal,

    pub quantity_values: BTreeMap<NaiveDate, Decimal>,
    pub current_values: BTreeMap<NaiveDate, Decimal>,
    pub current_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub investment_values: BTreeMap<NaiveDate, Decimal>,
    pub investment_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub gross_performance_values: BTreeMap<NaiveDate, Decimal>,
    pub gross_performance_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub net_performance_values: BTreeMap<NaiveDate, Decimal>,
    pub net_performance_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub gross_performance_percentages: BTreeMap<NaiveDate, Decimal>,
    pub gross_performance_percentages_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub net_performance_percentages: BTreeMap<NaiveDate, Decimal>,
    pub net_performance_percentages_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub time_weighted_performance_values: BTreeMap<NaiveDate, Decimal>,
    pub time_weighted_performance_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub time_weighted_investment_values: BTreeMap<NaiveDate, Decimal>,
    pub time_weighted_investment_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub dividend_values: BTreeMap<NaiveDate, Decimal>,
    pub dividend_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub interest_values: BTreeMap<NaiveDate, Decimal>,
    pub interest_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub fee_values: BTreeMap<NaiveDate, Decimal>,
    pub fee_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    /// Same-day flows, present only on days with trades.
    pub cash_flow_values: BTreeMap<NaiveDate, Decimal>,
    pub cash_flow_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    pub daily_fee_values: BTreeMap<NaiveDate, Decimal>,
    pub daily_fee_values_with_currency_effect: BTreeMap<NaiveDate, Decimal>,

    pub net_performance_by_range_with_currency_effect: BTreeMap<DateRange, Decimal>,
    pub net_performance_percentage_by_range_with_currency_effect: BTreeMap<DateRange, Decimal>,
    /// Average invested amount over the held days of each range.
    pub average_investment_by_range_with_currency_effect: BTreeMap<DateRange, Decimal>,

    pub has_errors: bool,
    pub errors: Vec<SymbolError>,
}

impl SymbolMetrics {
    pub fn push_error(&mut self, error: SymbolError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
        self.has_errors = true;
    }
}
