//! Money-weighted return: the internal rate of return of the external cash
//! flows plus the terminal value.

use chrono::NaiveDate;
use log::debug;
use rust_decimal::prelude::*;

use super::performance_model::ReturnMethod;
use crate::config::MwrSolverConfig;
use crate::constants::DAYS_PER_YEAR;
use crate::errors::CalculatorError;

/// Money moved into the portfolio on a date; withdrawals are negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashFlowEntry {
    pub date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoneyWeightedResult {
    /// Annual internal rate of return.
    pub annual_rate: Decimal,
    /// The annual rate compounded over the whole flow period.
    pub cumulative_return: Decimal,
    pub iterations: u32,
}

impl MoneyWeightedResult {
    fn zero() -> Self {
        Self {
            annual_rate: Decimal::ZERO,
            cumulative_return: Decimal::ZERO,
            iterations: 0,
        }
    }
}

/// Solves for the annual rate at which the discounted flows and the
/// terminal value net to zero.
///
/// Newton-Raphson steps are taken inside a bracket that is narrowed on every
/// iteration; a step leaving the bracket is replaced by bisection.
pub fn money_weighted_return(
    flows: &[CashFlowEntry],
    terminal_value: Decimal,
    terminal_date: NaiveDate,
    config: &MwrSolverConfig,
) -> Result<MoneyWeightedResult, CalculatorError> {
    let first_date = match flows.iter().map(|f| f.date).min() {
        Some(date) => date,
        None => return Ok(MoneyWeightedResult::zero()),
    };
    if flows.iter().all(|f| f.amount.is_zero()) && terminal_value.is_zero() {
        return Ok(MoneyWeightedResult::zero());
    }

    let days_per_year = Decimal::from(DAYS_PER_YEAR);
    let to_years = |date: NaiveDate| -> Decimal {
        Decimal::from((date - first_date).num_days().max(0)) / days_per_year
    };

    // Investor view: contributions leave the investor's pocket.
    let mut series: Vec<(Decimal, Decimal)> = flows
        .iter()
        .filter(|f| !f.amount.is_zero())
        .map(|f| (-f.amount, to_years(f.date)))
        .collect();
    series.push((terminal_value, to_years(terminal_date)));

    let scale = series
        .iter()
        .map(|(amount, _)| amount.abs())
        .max()
        .unwrap_or(Decimal::ONE)
        .max(Decimal::ONE);

    let (rate, iterations) = solve_rate(&series, scale, config)?;

    let total_years = to_years(terminal_date);
    let cumulative_return = (Decimal::ONE + rate)
        .checked_powd(total_years)
        .map(|growth| growth - Decimal::ONE)
        .ok_or_else(|| CalculatorError::Convergence {
            method: ReturnMethod::MoneyWeighted,
            iterations,
            reason: format!("compounding {} over {} years overflowed", rate, total_years),
        })?;

    debug!(
        "MWR converged to {} after {} iterations ({} flows)",
        rate,
        iterations,
        series.len()
    );

    Ok(MoneyWeightedResult {
        annual_rate: rate,
        cumulative_return,
        iterations,
    })
}

fn solve_rate(
    series: &[(Decimal, Decimal)],
    scale: Decimal,
    config: &MwrSolverConfig,
) -> Result<(Decimal, u32), CalculatorError> {
    let convergence = |iterations: u32, reason: String| CalculatorError::Convergence {
        method: ReturnMethod::MoneyWeighted,
        iterations,
        reason,
    };

    let (f_lower, _) = npv_and_derivative(series, config.lower_bound)
        .ok_or_else(|| convergence(0, format!("NPV overflowed at {}", config.lower_bound)))?;
    let (f_upper, _) = npv_and_derivative(series, config.upper_bound)
        .ok_or_else(|| convergence(0, format!("NPV overflowed at {}", config.upper_bound)))?;

    if f_lower.is_zero() {
        return Ok((config.lower_bound, 0));
    }
    if f_upper.is_zero() {
        return Ok((config.upper_bound, 0));
    }
    if f_lower.is_sign_negative() == f_upper.is_sign_negative() {
        return Err(convergence(
            0,
            format!(
                "NPV does not change sign in [{}, {}]",
                config.lower_bound, config.upper_bound
            ),
        ));
    }

    // Orient the bracket so that NPV(negative_side) < 0.
    let (mut negative_side, mut positive_side) = if f_lower.is_sign_negative() {
        (config.lower_bound, config.upper_bound)
    } else {
        (config.upper_bound, config.lower_bound)
    };

    let two = Decimal::TWO;
    let mut rate = config
        .initial_guess
        .max(config.lower_bound)
        .min(config.upper_bound);

    for iteration in 1..=config.max_iterations {
        let Some((npv, derivative)) = npv_and_derivative(series, rate) else {
            rate = (negative_side + positive_side) / two;
            continue;
        };

        if npv.abs() <= config.tolerance * scale {
            return Ok((rate, iteration));
        }

        if npv.is_sign_negative() {
            negative_side = rate;
        } else {
            positive_side = rate;
        }

        let low = negative_side.min(positive_side);
        let high = negative_side.max(positive_side);
        let newton = npv
            .checked_div(derivative)
            .and_then(|step| rate.checked_sub(step))
            .filter(|candidate| *candidate > low && *candidate < high);
        let next = newton.unwrap_or((negative_side + positive_side) / two);

        if (next - rate).abs() < config.tolerance || (high - low) < config.tolerance {
            return Ok((next, iteration));
        }
        rate = next;
    }

    Err(convergence(
        config.max_iterations,
        format!("no solution within tolerance {}", config.tolerance),
    ))
}

/// NPV of `(amount, years)` pairs at `rate` and its derivative by rate.
/// `None` when the discounting overflows.
fn npv_and_derivative(series: &[(Decimal, Decimal)], rate: Decimal) -> Option<(Decimal, Decimal)> {
    let base = Decimal::ONE + rate;
    if base <= Decimal::ZERO {
        return None;
    }

    let mut npv = Decimal::ZERO;
    let mut derivative = Decimal::ZERO;
    for (amount, years) in series {
        if years.is_zero() {
            npv = npv.checked_add(*amount)?;
            continue;
        }
        let growth = base.checked_powd(*years)?;
        if growth.is_zero() {
            return None;
        }
        let discounted = amount.checked_div(growth)?;
        npv = npv.checked_add(discounted)?;
        let slope = years.checked_mul(discounted)?.checked_div(base)?;
        derivative = derivative.checked_sub(slope)?;
    }
    Some((npv, derivative))
}
