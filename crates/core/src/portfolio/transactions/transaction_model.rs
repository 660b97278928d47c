use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::activities::ActivityType;

/// An activity of one symbol with its amounts expressed in the instrument
/// currency and in the base currency at the trade-date rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionInput {
    pub activity_id: String,
    pub activity_type: ActivityType,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub unit_price_in_base: Decimal,
    pub fee: Decimal,
    pub fee_in_base: Decimal,
}

impl TransactionInput {
    pub fn value(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    pub fn value_in_base(&self) -> Decimal {
        self.quantity * self.unit_price_in_base
    }
}

/// Cumulative state of one symbol at the end of a date on which at least
/// one of its activities occurred.
///
/// Amounts without suffix are in the instrument currency; the
/// `_with_currency_effect` variants are in the base currency, each
/// contribution converted at the rate of its own trade date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPoint {
    pub date: NaiveDate,
    pub quantity: Decimal,
    /// Moving-average cost basis of the held quantity.
    pub investment: Decimal,
    pub investment_with_currency_effect: Decimal,
    pub average_price: Decimal,
    pub fees: Decimal,
    pub fees_with_currency_effect: Decimal,
    pub dividend: Decimal,
    pub dividend_with_currency_effect: Decimal,
    pub interest: Decimal,
    pub interest_with_currency_effect: Decimal,
    /// Gains locked in by sells: proceeds minus the cost basis sold.
    pub realized_performance: Decimal,
    pub realized_performance_with_currency_effect: Decimal,
    pub transaction_count: usize,
    pub first_buy_date: Option<NaiveDate>,
    /// Unit price of the latest trade, used when no market price exists yet.
    pub last_unit_price: Decimal,
    /// Net amount bought on this date (sells negative), excluding fees.
    pub cash_flow: Decimal,
    pub cash_flow_with_currency_effect: Decimal,
    pub fees_on_date: Decimal,
    pub fees_on_date_with_currency_effect: Decimal,
    pub is_valuable: bool,
}
