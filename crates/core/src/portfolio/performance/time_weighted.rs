//! Time-weighted return chaining.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::performance_model::ReturnMethod;
use crate::errors::CalculatorError;
use crate::utils::decimal_utils::safe_div;

/// End-of-day valuation of one day together with the flows that happened on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyFlowPoint {
    pub date: NaiveDate,
    pub value: Decimal,
    /// Net amount invested on the day; withdrawals are negative.
    pub cash_flow: Decimal,
    pub fees: Decimal,
}

/// Return of one day with cash flows treated as happening at the end of it.
///
/// Without a prior value the day's return is measured against the amount
/// invested that day.
pub fn daily_return(previous_value: Decimal, point: &DailyFlowPoint) -> Decimal {
    if previous_value.is_zero() {
        if point.cash_flow.is_zero() {
            return Decimal::ZERO;
        }
        return safe_div(point.value - point.fees, point.cash_flow) - Decimal::ONE;
    }
    safe_div(point.value - point.cash_flow - point.fees, previous_value) - Decimal::ONE
}

/// Compounds `factor` with the return of one day. `None` when the result
/// leaves the decimal range.
pub fn compound_daily_return(
    factor: Decimal,
    previous_value: Decimal,
    point: &DailyFlowPoint,
) -> Option<Decimal> {
    Decimal::ONE
        .checked_add(daily_return(previous_value, point))
        .and_then(|growth| factor.checked_mul(growth))
}

/// Chains daily returns geometrically and returns the cumulative return as
/// of every day.
///
/// Days without flows telescope, so the result equals chaining the
/// sub-periods between flows. Fails with `CalculatorError::Overflow` on the
/// first day the chained factor cannot be represented.
pub fn chain_daily_returns(
    previous_value: Decimal,
    points: &[DailyFlowPoint],
) -> Result<BTreeMap<NaiveDate, Decimal>, CalculatorError> {
    let mut cumulative = BTreeMap::new();
    let mut factor = Decimal::ONE;
    let mut previous = previous_value;

    for point in points {
        factor = compound_daily_return(factor, previous, point).ok_or(
            CalculatorError::Overflow {
                method: ReturnMethod::TimeWeighted,
                date: point.date,
            },
        )?;
        cumulative.insert(point.date, factor - Decimal::ONE);
        previous = point.value;
    }

    Ok(cumulative)
}

/// Return between two cumulative time-weighted figures.
pub fn sub_period_return(cumulative_start: Decimal, cumulative_end: Decimal) -> Decimal {
    let start_factor = Decimal::ONE + cumulative_start;
    if start_factor.is_zero() {
        return Decimal::ZERO;
    }
    safe_div(Decimal::ONE + cumulative_end, start_factor) - Decimal::ONE
}
