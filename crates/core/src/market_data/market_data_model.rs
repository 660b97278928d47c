//! Market data domain models.

use crate::market_data::market_data_constants::{
    DATA_SOURCE_ALPHA_VANTAGE, DATA_SOURCE_COINGECKO, DATA_SOURCE_FINNHUB, DATA_SOURCE_MANUAL,
    DATA_SOURCE_YAHOO,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Data source for market data
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    Yahoo,
    AlphaVantage,
    Coingecko,
    Finnhub,
    /// Prices entered by the user; used for valuables.
    #[default]
    Manual,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Yahoo => DATA_SOURCE_YAHOO,
            DataSource::AlphaVantage => DATA_SOURCE_ALPHA_VANTAGE,
            DataSource::Coingecko => DATA_SOURCE_COINGECKO,
            DataSource::Finnhub => DATA_SOURCE_FINNHUB,
            DataSource::Manual => DATA_SOURCE_MANUAL,
        }
    }
}

impl From<&str> for DataSource {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            DATA_SOURCE_YAHOO => DataSource::Yahoo,
            DATA_SOURCE_ALPHA_VANTAGE => DataSource::AlphaVantage,
            DATA_SOURCE_COINGECKO => DataSource::Coingecko,
            DATA_SOURCE_FINNHUB => DataSource::Finnhub,
            _ => DataSource::Manual,
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies an instrument across data sources. Ordering is by symbol first,
/// which is the order positions are reported in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolKey {
    pub symbol: String,
    pub data_source: DataSource,
}

impl SymbolKey {
    pub fn new(symbol: &str, data_source: DataSource) -> Self {
        Self {
            symbol: symbol.to_string(),
            data_source,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.data_source, self.symbol)
    }
}

/// Result of looking up a price for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceLookup {
    /// A price recorded for exactly that date.
    Exact(Decimal),
    /// The latest earlier price, carried forward over a gap.
    Carried { price: Decimal, from: NaiveDate },
    /// No price on or before the date.
    Missing,
}

impl PriceLookup {
    pub fn price(&self) -> Option<Decimal> {
        match self {
            PriceLookup::Exact(price) => Some(*price),
            PriceLookup::Carried { price, .. } => Some(*price),
            PriceLookup::Missing => None,
        }
    }
}

/// Day-level closing prices of one instrument, read-only during a build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    prices: BTreeMap<NaiveDate, Decimal>,
}

impl PriceSeries {
    pub fn new(prices: BTreeMap<NaiveDate, Decimal>) -> Self {
        Self { prices }
    }

    pub fn insert(&mut self, date: NaiveDate, price: Decimal) {
        self.prices.insert(date, price);
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Price at `date`, carrying the latest earlier price forward over gaps.
    pub fn price_on(&self, date: NaiveDate) -> PriceLookup {
        match self.prices.range(..=date).next_back() {
            Some((found, price)) if *found == date => PriceLookup::Exact(*price),
            Some((found, price)) => PriceLookup::Carried {
                price: *price,
                from: *found,
            },
            None => PriceLookup::Missing,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next().copied()
    }
}

impl FromIterator<(NaiveDate, Decimal)> for PriceSeries {
    fn from_iter<T: IntoIterator<Item = (NaiveDate, Decimal)>>(iter: T) -> Self {
        Self {
            prices: iter.into_iter().collect(),
        }
    }
}
