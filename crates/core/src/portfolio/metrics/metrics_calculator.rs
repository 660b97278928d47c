use chrono::NaiveDate;
use log::{debug, error, warn};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::metrics_model::{DateRange, SymbolError, SymbolErrorKind, SymbolMetrics};
use crate::activities::SymbolProfile;
use crate::fx::ExchangeRateSeries;
use crate::market_data::{DataSource, PriceLookup, PriceSeries};
use crate::portfolio::performance::{compound_daily_return, sub_period_return, DailyFlowPoint};
use crate::portfolio::transactions::TransactionPoint;
use crate::utils::decimal_utils::{is_quantity_significant, safe_div, value_at_or_before};
use crate::utils::time_utils::{get_days_between, previous_day};

/// Everything needed to compute the metrics of one symbol. All references are
/// read-only, so inputs for several symbols can be evaluated in parallel.
#[derive(Debug, Clone, Copy)]
pub struct SymbolMetricsInput<'a> {
    pub profile: &'a SymbolProfile,
    pub points: &'a [TransactionPoint],
    pub prices: &'a PriceSeries,
    pub rates: &'a ExchangeRateSeries,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub max_price_gap_days: i64,
}

/// Running sums that are not stored per day.
#[derive(Default)]
struct Accumulators {
    twr_factor: Decimal,
    twr_factor_with_currency_effect: Decimal,
    previous_value: Decimal,
    previous_value_with_currency_effect: Decimal,
    held_days: u32,
    investment_sum: Decimal,
    investment_sum_with_currency_effect: Decimal,
    range_held_days: u32,
    range_investment_sum: Decimal,
    range_investment_sum_with_currency_effect: Decimal,
    missing_price_reported: bool,
    missing_rate_reported: bool,
    overflow_reported: bool,
    stale_from: Option<NaiveDate>,
}

/// Walks the days of the timeline and values the holding on each of them.
pub fn calculate_symbol_metrics(input: &SymbolMetricsInput<'_>) -> SymbolMetrics {
    let profile = input.profile;
    let mut metrics = SymbolMetrics {
        symbol: profile.symbol.clone(),
        data_source: profile.data_source.clone(),
        currency: profile.currency.clone(),
        asset_class: profile.asset_class.clone(),
        is_valuable: input.points.iter().any(|p| p.is_valuable),
        exchange_rate: Decimal::ONE,
        ..Default::default()
    };

    let first_point_date = input.points.first().map(|p| p.date);
    let timeline_start = first_point_date
        .map(|first| first.min(input.start_date))
        .unwrap_or(input.start_date);
    if input.points.is_empty() || timeline_start > input.end_date {
        return metrics;
    }

    // Initial value of the since-inception series.
    let first_investment = input
        .points
        .iter()
        .find(|p| p.investment > Decimal::ZERO)
        .map(|p| (p.investment, p.investment_with_currency_effect))
        .unwrap_or_default();

    let mut acc = Accumulators {
        twr_factor: Decimal::ONE,
        twr_factor_with_currency_effect: Decimal::ONE,
        ..Default::default()
    };

    for date in get_days_between(timeline_start, input.end_date) {
        let point = point_at(input.points, date);
        let same_day = point.filter(|p| p.date == date);

        let quantity = point.map(|p| p.quantity).unwrap_or_default();
        let held = is_quantity_significant(&quantity);

        let price = if held {
            resolve_price(input, &mut metrics, &mut acc, date, point)
        } else {
            Decimal::ZERO
        };
        let rate = resolve_rate(input, &mut metrics, &mut acc, date, held);

        let value = quantity * price;
        let value_with_currency_effect = value * rate;
        let investment = point.map(|p| p.investment).unwrap_or_default();
        let investment_with_currency_effect = point
            .map(|p| p.investment_with_currency_effect)
            .unwrap_or_default();
        let fees = point.map(|p| p.fees).unwrap_or_default();
        let fees_with_currency_effect = point
            .map(|p| p.fees_with_currency_effect)
            .unwrap_or_default();

        let gross = value - investment;
        let gross_with_currency_effect = value_with_currency_effect - investment_with_currency_effect;
        let net = gross - fees;
        let net_with_currency_effect = gross_with_currency_effect - fees_with_currency_effect;

        let (cash_flow, cash_flow_with_currency_effect, daily_fees, daily_fees_with_currency_effect) =
            same_day
                .map(|p| {
                    (
                        p.cash_flow,
                        p.cash_flow_with_currency_effect,
                        p.fees_on_date,
                        p.fees_on_date_with_currency_effect,
                    )
                })
                .unwrap_or_default();

        let local_day = DailyFlowPoint {
            date,
            value,
            cash_flow,
            fees: daily_fees,
        };
        let base_day = DailyFlowPoint {
            date,
            value: value_with_currency_effect,
            cash_flow: cash_flow_with_currency_effect,
            fees: daily_fees_with_currency_effect,
        };
        let local_factor = compound_daily_return(acc.twr_factor, acc.previous_value, &local_day);
        let base_factor = compound_daily_return(
            acc.twr_factor_with_currency_effect,
            acc.previous_value_with_currency_effect,
            &base_day,
        );
        match (local_factor, base_factor) {
            (Some(local), Some(base)) => {
                acc.twr_factor = local;
                acc.twr_factor_with_currency_effect = base;
            }
            _ => report_overflow(input, &mut metrics, &mut acc, date),
        }
        acc.previous_value = value;
        acc.previous_value_with_currency_effect = value_with_currency_effect;

        if held {
            acc.held_days += 1;
            acc.investment_sum += investment;
            acc.investment_sum_with_currency_effect += investment_with_currency_effect;
            if date >= input.start_date {
                acc.range_held_days += 1;
                acc.range_investment_sum += investment;
                acc.range_investment_sum_with_currency_effect += investment_with_currency_effect;
            }
        }
        let held_days = Decimal::from(acc.held_days);

        metrics.quantity_values.insert(date, quantity);
        metrics.current_values.insert(date, value);
        metrics
            .current_values_with_currency_effect
            .insert(date, value_with_currency_effect);
        metrics.investment_values.insert(date, investment);
        metrics
            .investment_values_with_currency_effect
            .insert(date, investment_with_currency_effect);
        metrics.gross_performance_values.insert(date, gross);
        metrics
            .gross_performance_values_with_currency_effect
            .insert(date, gross_with_currency_effect);
        metrics.net_performance_values.insert(date, net);
        metrics
            .net_performance_values_with_currency_effect
            .insert(date, net_with_currency_effect);
        metrics
            .gross_performance_percentages
            .insert(date, safe_div(gross, first_investment.0));
        metrics.gross_performance_percentages_with_currency_effect.insert(
            date,
            safe_div(gross_with_currency_effect, first_investment.1),
        );
        metrics
            .net_performance_percentages
            .insert(date, safe_div(net, first_investment.0));
        metrics.net_performance_percentages_with_currency_effect.insert(
            date,
            safe_div(net_with_currency_effect, first_investment.1),
        );
        metrics
            .time_weighted_performance_values
            .insert(date, acc.twr_factor - Decimal::ONE);
        metrics
            .time_weighted_performance_values_with_currency_effect
            .insert(date, acc.twr_factor_with_currency_effect - Decimal::ONE);
        metrics
            .time_weighted_investment_values
            .insert(date, safe_div(acc.investment_sum, held_days));
        metrics
            .time_weighted_investment_values_with_currency_effect
            .insert(date, safe_div(acc.investment_sum_with_currency_effect, held_days));
        metrics
            .dividend_values
            .insert(date, point.map(|p| p.dividend).unwrap_or_default());
        metrics.dividend_values_with_currency_effect.insert(
            date,
            point
                .map(|p| p.dividend_with_currency_effect)
                .unwrap_or_default(),
        );
        metrics
            .interest_values
            .insert(date, point.map(|p| p.interest).unwrap_or_default());
        metrics.interest_values_with_currency_effect.insert(
            date,
            point
                .map(|p| p.interest_with_currency_effect)
                .unwrap_or_default(),
        );
        metrics.fee_values.insert(date, fees);
        metrics
            .fee_values_with_currency_effect
            .insert(date, fees_with_currency_effect);
        if same_day.is_some() {
            metrics.cash_flow_values.insert(date, cash_flow);
            metrics
                .cash_flow_values_with_currency_effect
                .insert(date, cash_flow_with_currency_effect);
            metrics.daily_fee_values.insert(date, daily_fees);
            metrics
                .daily_fee_values_with_currency_effect
                .insert(date, daily_fees_with_currency_effect);
        }

        if date == input.end_date {
            metrics.market_price = price;
            metrics.exchange_rate = rate;
        }
    }

    fill_range_totals(input, &mut metrics, &acc);
    fill_date_range_maps(input, &mut metrics, first_point_date);

    if metrics.has_errors {
        debug!(
            "{} finished with {} data errors",
            metrics.symbol,
            metrics.errors.len()
        );
    }
    metrics
}

/// Latest transaction point at or before `date`.
fn point_at(points: &[TransactionPoint], date: NaiveDate) -> Option<&TransactionPoint> {
    let index = points.partition_point(|p| p.date <= date);
    index.checked_sub(1).map(|i| &points[i])
}

fn resolve_price(
    input: &SymbolMetricsInput<'_>,
    metrics: &mut SymbolMetrics,
    acc: &mut Accumulators,
    date: NaiveDate,
    point: Option<&TransactionPoint>,
) -> Decimal {
    let fallback = point.map(|p| p.last_unit_price).unwrap_or_default();
    match input.prices.price_on(date) {
        PriceLookup::Exact(price) => price,
        PriceLookup::Carried { price, from } => {
            let gap = (date - from).num_days();
            if gap > input.max_price_gap_days && acc.stale_from != Some(from) {
                acc.stale_from = Some(from);
                if input.profile.data_source != DataSource::Manual {
                    warn!(
                        "{}: price on {} carried from {} ({} days)",
                        input.profile.symbol, date, from, gap
                    );
                    metrics.push_error(SymbolError::new(
                        &input.profile.symbol,
                        input.profile.data_source.clone(),
                        SymbolErrorKind::StaleMarketPrice {
                            last_price_date: from,
                        },
                        format!(
                            "Price of {} on {} is {} days old",
                            input.profile.symbol, date, gap
                        ),
                    ));
                }
            }
            price
        }
        PriceLookup::Missing => {
            // Manual instruments are valued at their recorded unit price.
            if !acc.missing_price_reported && input.profile.data_source != DataSource::Manual {
                acc.missing_price_reported = true;
                warn!(
                    "{}: no market price on {}, using trade price {}",
                    input.profile.symbol, date, fallback
                );
                metrics.push_error(SymbolError::new(
                    &input.profile.symbol,
                    input.profile.data_source.clone(),
                    SymbolErrorKind::MissingMarketPrice { date },
                    format!("No market price for {} on {}", input.profile.symbol, date),
                ));
            }
            fallback
        }
    }
}

fn report_overflow(
    input: &SymbolMetricsInput<'_>,
    metrics: &mut SymbolMetrics,
    acc: &mut Accumulators,
    date: NaiveDate,
) {
    if acc.overflow_reported {
        return;
    }
    acc.overflow_reported = true;
    error!(
        "{}: time-weighted return overflowed on {}, keeping the last value",
        input.profile.symbol, date
    );
    metrics.push_error(SymbolError::new(
        &input.profile.symbol,
        input.profile.data_source.clone(),
        SymbolErrorKind::CalculationOverflow { date },
        format!(
            "Time-weighted return of {} overflowed on {}",
            input.profile.symbol, date
        ),
    ));
}

fn resolve_rate(
    input: &SymbolMetricsInput<'_>,
    metrics: &mut SymbolMetrics,
    acc: &mut Accumulators,
    date: NaiveDate,
    held: bool,
) -> Decimal {
    match input.rates.get_rate(&input.profile.currency, date) {
        Ok(rate) => rate,
        Err(e) => {
            if held && !acc.missing_rate_reported {
                acc.missing_rate_reported = true;
                warn!(
                    "{}: {} on {}, converting at 1",
                    input.profile.symbol, e, date
                );
                metrics.push_error(SymbolError::new(
                    &input.profile.symbol,
                    input.profile.data_source.clone(),
                    SymbolErrorKind::MissingExchangeRate {
                        currency: input.profile.currency.clone(),
                    },
                    e.to_string(),
                ));
            }
            Decimal::ONE
        }
    }
}

fn at_or_zero(series: &BTreeMap<NaiveDate, Decimal>, date: NaiveDate) -> Decimal {
    value_at_or_before(series, date).unwrap_or_default()
}

fn fill_range_totals(input: &SymbolMetricsInput<'_>, metrics: &mut SymbolMetrics, acc: &Accumulators) {
    let end = input.end_date;
    let baseline = previous_day(input.start_date);
    let end_point = point_at(input.points, end);
    let baseline_point = point_at(input.points, baseline);

    if let Some(point) = end_point {
        metrics.quantity = point.quantity;
        metrics.average_price = point.average_price;
        metrics.first_buy_date = point.first_buy_date;
        metrics.transaction_count = point.transaction_count;
    }
    if metrics.market_price.is_zero() {
        metrics.market_price = input
            .prices
            .price_on(end)
            .price()
            .or(end_point.map(|p| p.last_unit_price))
            .unwrap_or_default();
    }

    metrics.current_value = at_or_zero(&metrics.current_values, end);
    metrics.current_value_with_currency_effect =
        at_or_zero(&metrics.current_values_with_currency_effect, end);
    metrics.total_investment = at_or_zero(&metrics.investment_values, end);
    metrics.total_investment_with_currency_effect =
        at_or_zero(&metrics.investment_values_with_currency_effect, end);

    let delta = |series: &BTreeMap<NaiveDate, Decimal>| {
        at_or_zero(series, end) - at_or_zero(series, baseline)
    };
    metrics.gross_performance = delta(&metrics.gross_performance_values);
    metrics.gross_performance_with_currency_effect =
        delta(&metrics.gross_performance_values_with_currency_effect);
    metrics.net_performance = delta(&metrics.net_performance_values);
    metrics.net_performance_with_currency_effect =
        delta(&metrics.net_performance_values_with_currency_effect);
    metrics.total_fees = delta(&metrics.fee_values);
    metrics.total_fees_with_currency_effect = delta(&metrics.fee_values_with_currency_effect);
    metrics.total_dividend = delta(&metrics.dividend_values);
    metrics.total_dividend_with_currency_effect =
        delta(&metrics.dividend_values_with_currency_effect);
    metrics.total_interest = delta(&metrics.interest_values);
    metrics.total_interest_with_currency_effect =
        delta(&metrics.interest_values_with_currency_effect);

    let realized = |p: Option<&TransactionPoint>| {
        p.map(|p| (p.realized_performance, p.realized_performance_with_currency_effect))
            .unwrap_or_default()
    };
    let (realized_end, realized_end_ce) = realized(end_point);
    let (realized_base, realized_base_ce) = realized(baseline_point);
    metrics.realized_performance = realized_end - realized_base;
    metrics.realized_performance_with_currency_effect = realized_end_ce - realized_base_ce;

    // Investment at the range start if the holding predates it, else the
    // first investment made inside the range.
    let (initial, initial_ce) = match baseline_point {
        Some(p) if is_quantity_significant(&p.quantity) => {
            (p.investment, p.investment_with_currency_effect)
        }
        _ => input
            .points
            .iter()
            .filter(|p| p.date >= input.start_date && p.date <= end)
            .find(|p| p.investment > Decimal::ZERO)
            .map(|p| (p.investment, p.investment_with_currency_effect))
            .unwrap_or_default(),
    };
    metrics.initial_value = initial;
    metrics.initial_value_with_currency_effect = initial_ce;

    metrics.gross_performance_percentage = safe_div(metrics.gross_performance, initial);
    metrics.gross_performance_percentage_with_currency_effect =
        safe_div(metrics.gross_performance_with_currency_effect, initial_ce);
    metrics.net_performance_percentage = safe_div(metrics.net_performance, initial);
    metrics.net_performance_percentage_with_currency_effect =
        safe_div(metrics.net_performance_with_currency_effect, initial_ce);

    metrics.time_weighted_performance = sub_period_return(
        at_or_zero(&metrics.time_weighted_performance_values, baseline),
        at_or_zero(&metrics.time_weighted_performance_values, end),
    );
    metrics.time_weighted_performance_with_currency_effect = sub_period_return(
        at_or_zero(
            &metrics.time_weighted_performance_values_with_currency_effect,
            baseline,
        ),
        at_or_zero(&metrics.time_weighted_performance_values_with_currency_effect, end),
    );

    let range_days = Decimal::from(acc.range_held_days);
    metrics.time_weighted_investment = safe_div(acc.range_investment_sum, range_days);
    metrics.time_weighted_investment_with_currency_effect =
        safe_div(acc.range_investment_sum_with_currency_effect, range_days);
}

fn fill_date_range_maps(
    input: &SymbolMetricsInput<'_>,
    metrics: &mut SymbolMetrics,
    first_point_date: Option<NaiveDate>,
) {
    for range in DateRange::standard_ranges(input.end_date, first_point_date) {
        let Some((start, end)) = range.interval(input.end_date, first_point_date) else {
            continue;
        };
        let baseline = previous_day(start);
        let net = at_or_zero(&metrics.net_performance_values_with_currency_effect, end)
            - at_or_zero(&metrics.net_performance_values_with_currency_effect, baseline);
        let average_investment = average_held_investment(
            &metrics.investment_values_with_currency_effect,
            &metrics.quantity_values,
            start,
            end,
        );

        metrics
            .net_performance_by_range_with_currency_effect
            .insert(range, net);
        metrics
            .net_performance_percentage_by_range_with_currency_effect
            .insert(range, safe_div(net, average_investment));
        metrics
            .average_investment_by_range_with_currency_effect
            .insert(range, average_investment);
    }
}

/// Mean investment over the days in `[start, end]` on which a quantity was held.
pub fn average_held_investment(
    investments: &BTreeMap<NaiveDate, Decimal>,
    quantities: &BTreeMap<NaiveDate, Decimal>,
    start: NaiveDate,
    end: NaiveDate,
) -> Decimal {
    let mut sum = Decimal::ZERO;
    let mut days = 0u32;
    for (date, investment) in investments.range(start..=end) {
        if quantities
            .get(date)
            .is_some_and(is_quantity_significant)
        {
            sum += *investment;
            days += 1;
        }
    }
    safe_div(sum, Decimal::from(days))
}
