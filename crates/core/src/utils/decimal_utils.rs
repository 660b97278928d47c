//! Helpers around `rust_decimal::Decimal`, the only numeric type used for
//! money, quantities, rates and returns in this crate.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::constants::{DECIMAL_PRECISION, QUANTITY_THRESHOLD};

/// Divides, returning zero instead of failing when the divisor is zero.
///
/// Percentages over an empty or fully divested position are reported as 0,
/// never as an error or a non-finite value.
pub fn safe_div(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// Whether a quantity is large enough to count as a holding.
pub fn is_quantity_significant(quantity: &Decimal) -> bool {
    let threshold =
        Decimal::from_str_radix(QUANTITY_THRESHOLD, 10).unwrap_or_else(|_| Decimal::new(1, 8));
    quantity.abs() >= threshold
}

/// Rounds to the precision used on snapshot outputs.
pub fn round_output(value: Decimal) -> Decimal {
    value.round_dp(DECIMAL_PRECISION)
}

/// Returns the value at `date`, or the latest value before it.
pub fn value_at_or_before(series: &BTreeMap<NaiveDate, Decimal>, date: NaiveDate) -> Option<Decimal> {
    series.range(..=date).next_back().map(|(_, v)| *v)
}

/// Adds `series` into `target` date by date.
pub fn accumulate_series(
    target: &mut BTreeMap<NaiveDate, Decimal>,
    series: &BTreeMap<NaiveDate, Decimal>,
) {
    for (date, value) in series {
        *target.entry(*date).or_insert(Decimal::ZERO) += *value;
    }
}

/// Adds `series × factor` into `target` date by date.
pub fn accumulate_scaled_series(
    target: &mut BTreeMap<NaiveDate, Decimal>,
    series: &BTreeMap<NaiveDate, Decimal>,
    factor: Decimal,
) {
    for (date, value) in series {
        *target.entry(*date).or_insert(Decimal::ZERO) += *value * factor;
    }
}
