use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::fx_errors::FxError;

/// Upper-cases and trims an ISO currency code.
pub fn normalize_currency_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Day-level rates of several currencies against one base currency.
///
/// `rates[currency][date]` converts one unit of `currency` into the base
/// currency. The base currency itself always converts at 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateSeries {
    base_currency: String,
    rates: HashMap<String, BTreeMap<NaiveDate, Decimal>>,
}

impl ExchangeRateSeries {
    pub fn new(base_currency: &str) -> Self {
        Self {
            base_currency: normalize_currency_code(base_currency),
            rates: HashMap::new(),
        }
    }

    pub fn with_rates(
        base_currency: &str,
        rates: HashMap<String, BTreeMap<NaiveDate, Decimal>>,
    ) -> Self {
        let mut series = Self::new(base_currency);
        for (currency, history) in rates {
            for (date, rate) in history {
                series.insert(&currency, date, rate);
            }
        }
        series
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Records a rate. Zero or negative rates are not usable and are skipped.
    pub fn insert(&mut self, currency: &str, date: NaiveDate, rate: Decimal) {
        if rate <= Decimal::ZERO {
            return;
        }
        let currency = normalize_currency_code(currency);
        if currency == self.base_currency {
            return;
        }
        self.rates.entry(currency).or_default().insert(date, rate);
    }

    pub fn has_currency(&self, currency: &str) -> bool {
        let currency = normalize_currency_code(currency);
        currency == self.base_currency || self.rates.contains_key(&currency)
    }

    /// Rate converting `currency` into the base currency on `date`.
    ///
    /// Uses the rate of that date, else the most recent prior one, else the
    /// nearest later one.
    pub fn get_rate(&self, currency: &str, date: NaiveDate) -> Result<Decimal, FxError> {
        let currency = normalize_currency_code(currency);
        if currency.is_empty() {
            return Err(FxError::InvalidCurrencyCode(
                "empty currency code".to_string(),
            ));
        }
        if currency == self.base_currency {
            return Ok(Decimal::ONE);
        }

        let history = self.rates.get(&currency).ok_or_else(|| {
            FxError::RateNotFound(format!("{}/{}", currency, self.base_currency))
        })?;

        history
            .range(..=date)
            .next_back()
            .or_else(|| history.range(date..).next())
            .map(|(_, rate)| *rate)
            .ok_or_else(|| {
                FxError::RateNotFound(format!("{}/{} on {}", currency, self.base_currency, date))
            })
    }

    pub fn convert_to_base(
        &self,
        amount: Decimal,
        currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, FxError> {
        Ok(amount * self.get_rate(currency, date)?)
    }

    /// Converts between two arbitrary currencies through the base currency.
    pub fn convert(
        &self,
        amount: Decimal,
        from_currency: &str,
        to_currency: &str,
        date: NaiveDate,
    ) -> Result<Decimal, FxError> {
        if normalize_currency_code(from_currency) == normalize_currency_code(to_currency) {
            return Ok(amount);
        }
        let in_base = self.convert_to_base(amount, from_currency, date)?;
        let to_rate = self.get_rate(to_currency, date)?;
        in_base.checked_div(to_rate).ok_or_else(|| {
            FxError::ConversionError(format!(
                "cannot convert {} {} to {}",
                amount, from_currency, to_currency
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series() -> ExchangeRateSeries {
        let mut series = ExchangeRateSeries::new("chf");
        series.insert("USD", d(10), dec!(0.90));
        series.insert("USD", d(20), dec!(0.80));
        series.insert("eur", d(15), dec!(0.95));
        series
    }

    #[test]
    fn test_exact_date_match() {
        assert_eq!(series().get_rate("USD", d(10)).unwrap(), dec!(0.90));
    }

    #[test]
    fn test_prior_rate_wins_over_closer_later_rate() {
        // Day 19 is closer to the day-20 rate, but the prior rate is used.
        assert_eq!(series().get_rate("USD", d(19)).unwrap(), dec!(0.90));
        assert_eq!(series().get_rate("USD", d(25)).unwrap(), dec!(0.80));
    }

    #[test]
    fn test_falls_back_to_next_rate_before_first_entry() {
        assert_eq!(series().get_rate("USD", d(1)).unwrap(), dec!(0.90));
    }

    #[test]
    fn test_base_currency_is_identity() {
        let series = series();
        assert_eq!(series.base_currency(), "CHF");
        assert_eq!(series.get_rate("Chf", d(1)).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_unknown_currency_is_rate_not_found() {
        assert!(matches!(
            series().get_rate("JPY", d(1)),
            Err(FxError::RateNotFound(_))
        ));
        assert!(matches!(
            series().get_rate(" ", d(1)),
            Err(FxError::InvalidCurrencyCode(_))
        ));
    }

    #[test]
    fn test_cross_conversion_goes_through_base() {
        // 100 USD -> 80 CHF -> 80 / 0.95 EUR
        let converted = series().convert(dec!(100), "USD", "EUR", d(20)).unwrap();
        assert_eq!(converted.round_dp(6), dec!(84.210526));
        assert_eq!(
            series().convert(dec!(5), "usd", "USD", d(1)).unwrap(),
            dec!(5)
        );
    }

    #[test]
    fn test_non_positive_rates_are_ignored() {
        let mut series = ExchangeRateSeries::new("USD");
        series.insert("GBP", d(1), Decimal::ZERO);
        assert!(!series.has_currency("GBP"));
    }
}
