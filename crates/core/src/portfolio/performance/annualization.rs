//! Converts a cumulative return into an annual rate.

use log::warn;
use rust_decimal::prelude::*;

use crate::constants::DAYS_PER_YEAR;

/// `(1 + p)^(365 / days) - 1`.
///
/// Unknown, zero or negative `days_in_market` yields 0. A cumulative loss of
/// 100% or more yields -1.
pub fn annualized_performance(
    days_in_market: Option<Decimal>,
    net_performance_percentage: Decimal,
) -> Decimal {
    let days = match days_in_market {
        Some(days) if days > Decimal::ZERO => days,
        _ => return Decimal::ZERO,
    };

    let base = Decimal::ONE + net_performance_percentage;
    if base <= Decimal::ZERO {
        return -Decimal::ONE;
    }

    let exponent = match Decimal::from(DAYS_PER_YEAR).checked_div(days) {
        Some(exponent) => exponent,
        None => return Decimal::ZERO,
    };

    match base.checked_powd(exponent) {
        Some(growth) => growth - Decimal::ONE,
        None => {
            warn!(
                "Annualizing {} over {} days overflowed, reporting 0",
                net_performance_percentage, days
            );
            Decimal::ZERO
        }
    }
}

/// Days in market from a float that may be NaN or infinite.
pub fn days_in_market_from_f64(days: f64) -> Option<Decimal> {
    if !days.is_finite() {
        return None;
    }
    Decimal::from_f64_retain(days)
}
