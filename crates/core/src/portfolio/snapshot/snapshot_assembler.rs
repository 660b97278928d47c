use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use log::{debug, error, warn};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::snapshot_model::{HistoricalDataItem, PortfolioSnapshot, TimelinePosition};
use crate::activities::{sort_activities, Activity, ActivityType, SymbolProfile};
use crate::config::EngineConfig;
use crate::errors::{CalculatorError, Result, ValidationError};
use crate::fx::{normalize_currency_code, ExchangeRateResolverTrait, ExchangeRateSeries};
use crate::market_data::{DataSource, MarketPriceResolverTrait, PriceSeries, SymbolKey};
use crate::portfolio::metrics::{
    average_held_investment, calculate_symbol_metrics, DateRange, SymbolError, SymbolErrorKind,
    SymbolMetrics, SymbolMetricsInput,
};
use crate::portfolio::performance::{
    annualized_performance, chain_daily_returns, money_weighted_return, sub_period_return,
    CashFlowEntry, DailyFlowPoint, ReturnMethod,
};
use crate::portfolio::portfolio_model::CashBalance;
use crate::portfolio::transactions::{aggregate_transactions, convert_activity, TransactionPoint};
use crate::utils::decimal_utils::{
    accumulate_scaled_series, accumulate_series, round_output, safe_div, value_at_or_before,
};
use crate::utils::time_utils::{get_days_between, previous_day};

/// Already filtered inputs of one snapshot build.
#[derive(Debug, Clone)]
pub struct SnapshotInput {
    pub base_currency: String,
    pub range: DateRange,
    pub end_date: NaiveDate,
    pub method: ReturnMethod,
    pub activities: Vec<Activity>,
    pub cash_balances: Vec<CashBalance>,
}

/// A symbol whose history aggregated cleanly.
struct PreparedSymbol {
    profile: SymbolProfile,
    points: Vec<TransactionPoint>,
    errors: Vec<SymbolError>,
}

/// Activities routed by what they affect.
#[derive(Default)]
struct RoutedActivities<'a> {
    symbols: BTreeMap<SymbolKey, (SymbolProfile, Vec<&'a Activity>)>,
    cash_only: Vec<&'a Activity>,
    liabilities: Vec<&'a Activity>,
}

/// Day-indexed sums over all positions, in the base currency. Amounts without
/// currency effect are converted at the end-date rate.
#[derive(Default)]
struct PortfolioSeries {
    value: BTreeMap<NaiveDate, Decimal>,
    value_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    cash_flow: BTreeMap<NaiveDate, Decimal>,
    cash_flow_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    fees: BTreeMap<NaiveDate, Decimal>,
    fees_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    investment_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    net_performance_with_currency_effect: BTreeMap<NaiveDate, Decimal>,
    quantity: BTreeMap<NaiveDate, Decimal>,
}

impl PortfolioSeries {
    fn from_metrics(metrics: &[SymbolMetrics]) -> Self {
        let mut series = Self::default();
        for m in metrics {
            let rate = m.exchange_rate;
            accumulate_scaled_series(&mut series.value, &m.current_values, rate);
            accumulate_series(
                &mut series.value_with_currency_effect,
                &m.current_values_with_currency_effect,
            );
            accumulate_scaled_series(&mut series.cash_flow, &m.cash_flow_values, rate);
            accumulate_series(
                &mut series.cash_flow_with_currency_effect,
                &m.cash_flow_values_with_currency_effect,
            );
            accumulate_scaled_series(&mut series.fees, &m.daily_fee_values, rate);
            accumulate_series(
                &mut series.fees_with_currency_effect,
                &m.daily_fee_values_with_currency_effect,
            );
            accumulate_series(
                &mut series.investment_with_currency_effect,
                &m.investment_values_with_currency_effect,
            );
            accumulate_series(
                &mut series.net_performance_with_currency_effect,
                &m.net_performance_values_with_currency_effect,
            );
            accumulate_series(&mut series.quantity, &m.quantity_values);
        }
        series
    }

    /// Daily valuation and flows, with fees dropped for gross figures.
    fn flow_points(&self, with_currency_effect: bool, net: bool) -> Vec<DailyFlowPoint> {
        let (values, flows, fees) = if with_currency_effect {
            (
                &self.value_with_currency_effect,
                &self.cash_flow_with_currency_effect,
                &self.fees_with_currency_effect,
            )
        } else {
            (&self.value, &self.cash_flow, &self.fees)
        };
        values
            .iter()
            .map(|(date, value)| DailyFlowPoint {
                date: *date,
                value: *value,
                cash_flow: flows.get(date).copied().unwrap_or_default(),
                fees: if net {
                    fees.get(date).copied().unwrap_or_default()
                } else {
                    Decimal::ZERO
                },
            })
            .collect()
    }
}

/// Gross and net return percentages with and without currency effect.
#[derive(Debug, Default, Clone, Copy)]
struct MethodPercentages {
    gross: Decimal,
    gross_with_currency_effect: Decimal,
    net: Decimal,
    net_with_currency_effect: Decimal,
}

/// Builds [`PortfolioSnapshot`]s from activities, prices and rates.
pub struct SnapshotAssembler {
    price_resolver: Arc<dyn MarketPriceResolverTrait>,
    rate_resolver: Arc<dyn ExchangeRateResolverTrait>,
    config: EngineConfig,
}

impl SnapshotAssembler {
    pub fn new(
        price_resolver: Arc<dyn MarketPriceResolverTrait>,
        rate_resolver: Arc<dyn ExchangeRateResolverTrait>,
        config: EngineConfig,
    ) -> Self {
        Self {
            price_resolver,
            rate_resolver,
            config,
        }
    }

    pub async fn assemble(&self, input: SnapshotInput) -> Result<PortfolioSnapshot> {
        let SnapshotInput {
            base_currency,
            range,
            end_date,
            method,
            mut activities,
            cash_balances,
        } = input;

        let base_currency = normalize_currency_code(&base_currency);
        if base_currency.is_empty() {
            return Err(ValidationError::MissingField("baseCurrency".to_string()).into());
        }

        activities.retain(|a| a.date <= end_date);
        sort_activities(&mut activities);
        let first_date = activities.first().map(|a| a.date);
        let (start_date, end_date) = range
            .interval(end_date, first_date)
            .unwrap_or((end_date, end_date));
        let fetch_start = first_date.map_or(start_date, |first| first.min(start_date));

        debug!(
            "Assembling {} snapshot in {} from {} to {} over {} activities",
            method,
            base_currency,
            start_date,
            end_date,
            activities.len()
        );

        let rates = self
            .load_rates(&base_currency, &activities, &cash_balances, fetch_start, end_date)
            .await?;

        let mut errors = Vec::new();
        let routed = route_activities(&activities, &mut errors);
        let prepared = prepare_symbols(routed.symbols, &rates, &mut errors);
        let prices = self.load_prices(&prepared, start_date, end_date).await?;
        let metrics = self.calculate_metrics(&prepared, &prices, &rates, start_date, end_date);

        let mut snapshot = PortfolioSnapshot {
            base_currency: base_currency.clone(),
            start_date: Some(start_date),
            end_date: Some(end_date),
            method,
            effective_method: method,
            ..Default::default()
        };

        let cash_totals = cash_only_totals(&routed.cash_only, &rates, start_date, end_date, &mut errors);
        let liabilities = liability_series(&routed.liabilities, &rates, &mut errors);
        let cash_in_base = cash_in_base_currency(&cash_balances, &rates, end_date, &mut errors);

        self.combine(
            &mut snapshot,
            &metrics,
            &liabilities,
            cash_in_base,
            cash_totals,
            first_date,
        );

        for m in &metrics {
            errors.extend(m.errors.iter().cloned());
        }
        let mut unique = Vec::with_capacity(errors.len());
        for e in errors {
            if !unique.contains(&e) {
                unique.push(e);
            }
        }
        snapshot.has_errors = !unique.is_empty();
        snapshot.errors = unique;
        snapshot.positions = metrics.iter().map(TimelinePosition::from).collect();

        if snapshot.has_errors {
            warn!(
                "Snapshot in {} finished with {} symbol errors",
                base_currency,
                snapshot.errors.len()
            );
        }
        Ok(snapshot)
    }

    async fn load_rates(
        &self,
        base_currency: &str,
        activities: &[Activity],
        cash_balances: &[CashBalance],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ExchangeRateSeries> {
        let mut currencies = BTreeSet::new();
        for activity in activities {
            currencies.insert(normalize_currency_code(&activity.currency));
            if let Some(profile) = &activity.symbol_profile {
                currencies.insert(normalize_currency_code(&profile.currency));
            }
        }
        for balance in cash_balances {
            currencies.insert(normalize_currency_code(&balance.currency));
        }
        currencies.remove(base_currency);
        currencies.remove("");

        if currencies.is_empty() {
            return Ok(ExchangeRateSeries::new(base_currency));
        }
        let currencies: Vec<String> = currencies.into_iter().collect();
        debug!("Loading {} rates for {:?}", base_currency, currencies);
        self.rate_resolver
            .get_rates(base_currency, &currencies, start, end)
            .await
    }

    /// Fetches the price series of every symbol, a bounded number at a time.
    async fn load_prices(
        &self,
        prepared: &[PreparedSymbol],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<SymbolKey, PriceSeries>> {
        let concurrency = self.config.price_fetch_concurrency.max(1);
        let requests: Vec<_> = prepared
            .iter()
            .map(|symbol| {
                let resolver = Arc::clone(&self.price_resolver);
                let key = symbol.profile.key();
                let from = symbol
                    .points
                    .first()
                    .map_or(start, |point| point.date.min(start));
                async move {
                    let series = resolver
                        .get_prices(&key.symbol, &key.data_source, from, end)
                        .await;
                    (key, series)
                }
            })
            .collect();

        let results: Vec<(SymbolKey, Result<PriceSeries>)> = stream::iter(requests)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut prices = HashMap::with_capacity(results.len());
        for (key, series) in results {
            prices.insert(key, series?);
        }
        Ok(prices)
    }

    fn calculate_metrics(
        &self,
        prepared: &[PreparedSymbol],
        prices: &HashMap<SymbolKey, PriceSeries>,
        rates: &ExchangeRateSeries,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Vec<SymbolMetrics> {
        let max_price_gap_days = self.config.max_price_gap_days;
        let no_prices = PriceSeries::default();

        let mut metrics: Vec<SymbolMetrics> = prepared
            .par_iter()
            .map(|symbol| {
                let key = symbol.profile.key();
                let mut m = calculate_symbol_metrics(&SymbolMetricsInput {
                    profile: &symbol.profile,
                    points: &symbol.points,
                    prices: prices.get(&key).unwrap_or(&no_prices),
                    rates,
                    start_date,
                    end_date,
                    max_price_gap_days,
                });
                for e in &symbol.errors {
                    m.push_error(e.clone());
                }
                m
            })
            .collect();

        metrics.sort_by(|a, b| {
            a.symbol
                .cmp(&b.symbol)
                .then_with(|| a.data_source.cmp(&b.data_source))
        });
        metrics
    }

    fn combine(
        &self,
        snapshot: &mut PortfolioSnapshot,
        metrics: &[SymbolMetrics],
        liabilities: &BTreeMap<NaiveDate, Decimal>,
        cash_in_base: Decimal,
        cash_totals: CashTotals,
        first_date: Option<NaiveDate>,
    ) {
        let (Some(start_date), Some(end_date)) = (snapshot.start_date, snapshot.end_date) else {
            return;
        };
        let baseline = previous_day(start_date);
        let converted = |f: fn(&SymbolMetrics) -> Decimal| -> Decimal {
            metrics.iter().map(|m| f(m) * m.exchange_rate).sum()
        };
        let summed = |f: fn(&SymbolMetrics) -> Decimal| -> Decimal { metrics.iter().map(f).sum() };

        let positions_value = summed(|m| m.current_value_with_currency_effect);
        let liabilities_total = value_at_or_before(liabilities, end_date).unwrap_or_default();

        snapshot.current_value_in_base_currency = positions_value + cash_in_base - liabilities_total;
        snapshot.total_investment = converted(|m| m.total_investment);
        snapshot.total_investment_with_currency_effect =
            summed(|m| m.total_investment_with_currency_effect);
        snapshot.gross_performance = converted(|m| m.gross_performance);
        snapshot.gross_performance_with_currency_effect =
            summed(|m| m.gross_performance_with_currency_effect);
        snapshot.net_performance = converted(|m| m.net_performance);
        snapshot.net_performance_with_currency_effect =
            summed(|m| m.net_performance_with_currency_effect);
        snapshot.currency_effect =
            snapshot.net_performance_with_currency_effect - snapshot.net_performance;

        snapshot.total_fees_with_currency_effect =
            summed(|m| m.total_fees_with_currency_effect) + cash_totals.fees;
        snapshot.total_interest_with_currency_effect =
            summed(|m| m.total_interest_with_currency_effect) + cash_totals.interest;
        snapshot.total_dividend_with_currency_effect =
            summed(|m| m.total_dividend_with_currency_effect) + cash_totals.dividend;
        snapshot.total_valuables_with_currency_effect = metrics
            .iter()
            .filter(|m| m.is_valuable)
            .map(|m| m.current_value_with_currency_effect)
            .sum();
        snapshot.total_liabilities_with_currency_effect = liabilities_total;
        snapshot.cash_balance_in_base_currency = cash_in_base;
        snapshot.realized_performance_with_currency_effect =
            summed(|m| m.realized_performance_with_currency_effect);

        let series = PortfolioSeries::from_metrics(metrics);
        let twr_cumulative_with_currency_effect =
            chain_daily_returns(Decimal::ZERO, &series.flow_points(true, true)).unwrap_or_else(
                |e| {
                    error!("Historical time-weighted series left empty: {}", e);
                    BTreeMap::new()
                },
            );

        let method = snapshot.method;
        let mut candidates = vec![
            method,
            ReturnMethod::TimeWeighted,
            ReturnMethod::ReturnOnInvestment,
        ];
        candidates.dedup();
        let mut chosen = None;
        for candidate in candidates {
            match self.percentages(candidate, snapshot, metrics, &series, start_date, end_date) {
                Ok(percentages) => {
                    chosen = Some((candidate, percentages));
                    break;
                }
                Err(e) => {
                    error!(
                        "{} for {} to {} failed, trying the next method: {}",
                        candidate, start_date, end_date, e
                    );
                    snapshot.fallback_reason.get_or_insert(e.to_string());
                }
            }
        }
        let (effective_method, percentages) =
            chosen.unwrap_or((ReturnMethod::ReturnOnInvestment, MethodPercentages::default()));
        snapshot.effective_method = effective_method;
        snapshot.gross_performance_percentage = percentages.gross;
        snapshot.gross_performance_percentage_with_currency_effect =
            percentages.gross_with_currency_effect;
        snapshot.net_performance_percentage = percentages.net;
        snapshot.net_performance_percentage_with_currency_effect =
            percentages.net_with_currency_effect;

        let days_in_market = metrics
            .iter()
            .filter_map(|m| m.first_buy_date)
            .min()
            .map(|first_buy| Decimal::from((end_date - first_buy.max(start_date)).num_days()));
        snapshot.net_annualized_performance =
            annualized_performance(days_in_market, snapshot.net_performance_percentage);
        snapshot.net_annualized_performance_with_currency_effect = annualized_performance(
            days_in_market,
            snapshot.net_performance_percentage_with_currency_effect,
        );

        for range in DateRange::standard_ranges(end_date, first_date) {
            let Some((range_start, range_end)) = range.interval(end_date, first_date) else {
                continue;
            };
            let net = at_or_zero(&series.net_performance_with_currency_effect, range_end)
                - at_or_zero(
                    &series.net_performance_with_currency_effect,
                    previous_day(range_start),
                );
            let average_investment = average_held_investment(
                &series.investment_with_currency_effect,
                &series.quantity,
                range_start,
                range_end,
            );
            snapshot
                .net_performance_by_range_with_currency_effect
                .insert(range, round_output(net));
            snapshot
                .net_performance_percentage_by_range_with_currency_effect
                .insert(range, round_output(safe_div(net, average_investment)));
        }

        let initial_with_currency_effect = summed(|m| m.initial_value_with_currency_effect);
        let net_at_baseline = at_or_zero(&series.net_performance_with_currency_effect, baseline);
        let twr_at_baseline = at_or_zero(&twr_cumulative_with_currency_effect, baseline);
        snapshot.historical_data = get_days_between(start_date, end_date)
            .into_iter()
            .map(|date| {
                let value = at_or_zero(&series.value_with_currency_effect, date);
                let net = at_or_zero(&series.net_performance_with_currency_effect, date)
                    - net_at_baseline;
                let liabilities_on_date = value_at_or_before(liabilities, date).unwrap_or_default();
                HistoricalDataItem {
                    date,
                    net_worth: round_output(value + cash_in_base - liabilities_on_date),
                    value_with_currency_effect: round_output(value),
                    total_investment_with_currency_effect: round_output(at_or_zero(
                        &series.investment_with_currency_effect,
                        date,
                    )),
                    investment_value_with_currency_effect: round_output(
                        series
                            .cash_flow_with_currency_effect
                            .get(&date)
                            .copied()
                            .unwrap_or_default(),
                    ),
                    net_performance_with_currency_effect: round_output(net),
                    net_performance_in_percentage_with_currency_effect: round_output(safe_div(
                        net,
                        initial_with_currency_effect,
                    )),
                    time_weighted_performance_with_currency_effect: round_output(
                        sub_period_return(
                            twr_at_baseline,
                            at_or_zero(&twr_cumulative_with_currency_effect, date),
                        ),
                    ),
                }
            })
            .collect();

        round_snapshot(snapshot);
    }

    fn percentages(
        &self,
        method: ReturnMethod,
        snapshot: &PortfolioSnapshot,
        metrics: &[SymbolMetrics],
        series: &PortfolioSeries,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> std::result::Result<MethodPercentages, CalculatorError> {
        let converted = |f: fn(&SymbolMetrics) -> Decimal| -> Decimal {
            metrics.iter().map(|m| f(m) * m.exchange_rate).sum()
        };
        let summed = |f: fn(&SymbolMetrics) -> Decimal| -> Decimal { metrics.iter().map(f).sum() };

        match method {
            ReturnMethod::ReturnOnInvestment => {
                let initial = converted(|m| m.initial_value);
                let initial_with_currency_effect = summed(|m| m.initial_value_with_currency_effect);
                Ok(MethodPercentages {
                    gross: safe_div(snapshot.gross_performance, initial),
                    gross_with_currency_effect: safe_div(
                        snapshot.gross_performance_with_currency_effect,
                        initial_with_currency_effect,
                    ),
                    net: safe_div(snapshot.net_performance, initial),
                    net_with_currency_effect: safe_div(
                        snapshot.net_performance_with_currency_effect,
                        initial_with_currency_effect,
                    ),
                })
            }
            ReturnMethod::ReturnOnAverageInvestment => {
                let average = converted(|m| m.time_weighted_investment);
                let average_with_currency_effect =
                    summed(|m| m.time_weighted_investment_with_currency_effect);
                Ok(MethodPercentages {
                    gross: safe_div(snapshot.gross_performance, average),
                    gross_with_currency_effect: safe_div(
                        snapshot.gross_performance_with_currency_effect,
                        average_with_currency_effect,
                    ),
                    net: safe_div(snapshot.net_performance, average),
                    net_with_currency_effect: safe_div(
                        snapshot.net_performance_with_currency_effect,
                        average_with_currency_effect,
                    ),
                })
            }
            ReturnMethod::TimeWeighted => time_weighted_percentages(series, start_date, end_date),
            ReturnMethod::MoneyWeighted => {
                let solve = |with_currency_effect: bool, net: bool| {
                    let points = series.flow_points(with_currency_effect, net);
                    let (flows, terminal_value) = external_flows(&points, start_date, end_date);
                    money_weighted_return(&flows, terminal_value, end_date, &self.config.mwr)
                        .map(|result| result.cumulative_return)
                };
                Ok(MethodPercentages {
                    gross: solve(false, false)?,
                    gross_with_currency_effect: solve(true, false)?,
                    net: solve(false, true)?,
                    net_with_currency_effect: solve(true, true)?,
                })
            }
        }
    }
}

fn at_or_zero(series: &BTreeMap<NaiveDate, Decimal>, date: NaiveDate) -> Decimal {
    value_at_or_before(series, date).unwrap_or_default()
}

fn time_weighted_percentages(
    series: &PortfolioSeries,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> std::result::Result<MethodPercentages, CalculatorError> {
    let baseline = previous_day(start_date);
    let chained = |with_currency_effect: bool,
                   net: bool|
     -> std::result::Result<Decimal, CalculatorError> {
        let cumulative =
            chain_daily_returns(Decimal::ZERO, &series.flow_points(with_currency_effect, net))?;
        Ok(sub_period_return(
            at_or_zero(&cumulative, baseline),
            at_or_zero(&cumulative, end_date),
        ))
    };
    Ok(MethodPercentages {
        gross: chained(false, false)?,
        gross_with_currency_effect: chained(true, false)?,
        net: chained(false, true)?,
        net_with_currency_effect: chained(true, true)?,
    })
}

/// Flows into the positions over `[start, end]`, opened by the value held the
/// day before `start`, and the value at `end`. Fees count as money paid in.
fn external_flows(
    points: &[DailyFlowPoint],
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> (Vec<CashFlowEntry>, Decimal) {
    let baseline = previous_day(start_date);
    let mut flows = Vec::new();
    let mut terminal_value = Decimal::ZERO;

    if let Some(opening) = points.iter().rev().find(|p| p.date <= baseline) {
        if !opening.value.is_zero() {
            flows.push(CashFlowEntry {
                date: baseline,
                amount: opening.value,
            });
        }
    }
    for point in points
        .iter()
        .filter(|p| p.date >= start_date && p.date <= end_date)
    {
        let amount = point.cash_flow + point.fees;
        if !amount.is_zero() {
            flows.push(CashFlowEntry {
                date: point.date,
                amount,
            });
        }
        terminal_value = point.value;
    }
    (flows, terminal_value)
}

/// Checks every activity and groups the valid ones. A symbol with any
/// invalid activity is dropped entirely.
fn route_activities<'a>(
    activities: &'a [Activity],
    errors: &mut Vec<SymbolError>,
) -> RoutedActivities<'a> {
    let mut excluded = BTreeSet::new();
    let mut valid = Vec::with_capacity(activities.len());
    for activity in activities {
        if let Err(reason) = activity.validate() {
            let (symbol, data_source) = match &activity.symbol_profile {
                Some(profile) => {
                    excluded.insert(profile.key());
                    (profile.symbol.clone(), profile.data_source.clone())
                }
                None => (normalize_currency_code(&activity.currency), DataSource::Manual),
            };
            error!("Excluding {} on {}: {}", symbol, activity.date, reason);
            errors.push(SymbolError::new(
                &symbol,
                data_source,
                SymbolErrorKind::Integrity,
                reason,
            ));
        } else {
            valid.push(activity);
        }
    }

    let mut routed = RoutedActivities::default();
    for activity in valid {
        if activity.activity_type == ActivityType::Liability {
            routed.liabilities.push(activity);
            continue;
        }
        match &activity.symbol_profile {
            None => routed.cash_only.push(activity),
            Some(profile) => {
                let key = profile.key();
                if excluded.contains(&key) {
                    continue;
                }
                routed
                    .symbols
                    .entry(key)
                    .or_insert_with(|| {
                        let mut profile = profile.clone();
                        profile.currency = normalize_currency_code(&profile.currency);
                        (profile, Vec::new())
                    })
                    .1
                    .push(activity);
            }
        }
    }
    routed
}

/// Converts and aggregates each symbol. Symbols whose history is
/// inconsistent are logged, listed and left out.
fn prepare_symbols(
    symbols: BTreeMap<SymbolKey, (SymbolProfile, Vec<&Activity>)>,
    rates: &ExchangeRateSeries,
    errors: &mut Vec<SymbolError>,
) -> Vec<PreparedSymbol> {
    let mut prepared = Vec::with_capacity(symbols.len());

    for (_, (profile, activities)) in symbols {
        let mut symbol_errors: Vec<SymbolError> = Vec::new();
        let inputs: Vec<_> = activities
            .iter()
            .map(|activity| {
                let (input, missing) = convert_activity(activity, &profile.currency, rates);
                if let Some(currency) = missing {
                    let e = SymbolError::new(
                        &profile.symbol,
                        profile.data_source.clone(),
                        SymbolErrorKind::MissingExchangeRate {
                            currency: currency.clone(),
                        },
                        format!(
                            "No {}/{} rate for activity {} on {}",
                            currency,
                            rates.base_currency(),
                            activity.id,
                            activity.date
                        ),
                    );
                    if !symbol_errors.contains(&e) {
                        symbol_errors.push(e);
                    }
                }
                input
            })
            .collect();

        match aggregate_transactions(&profile.symbol, &inputs) {
            Ok(points) => prepared.push(PreparedSymbol {
                profile,
                points,
                errors: symbol_errors,
            }),
            Err(e) => {
                error!("Excluding {} from the snapshot: {}", profile.key(), e);
                errors.push(SymbolError::new(
                    &profile.symbol,
                    profile.data_source.clone(),
                    SymbolErrorKind::Integrity,
                    e.to_string(),
                ));
            }
        }
    }
    prepared
}

/// Converts `amount` at the rate of `date`, recording a missing rate once.
fn to_base(
    amount: Decimal,
    currency: &str,
    date: NaiveDate,
    rates: &ExchangeRateSeries,
    errors: &mut Vec<SymbolError>,
) -> Decimal {
    match rates.convert_to_base(amount, currency, date) {
        Ok(converted) => converted,
        Err(e) => {
            let currency = normalize_currency_code(currency);
            warn!("{} on {}, converting {} at 1", e, date, currency);
            let error = SymbolError::new(
                &currency,
                DataSource::Manual,
                SymbolErrorKind::MissingExchangeRate {
                    currency: currency.clone(),
                },
                e.to_string(),
            );
            if !errors.contains(&error) {
                errors.push(error);
            }
            amount
        }
    }
}

/// Fees, interest and dividends booked without an instrument.
#[derive(Debug, Default, Clone, Copy)]
struct CashTotals {
    fees: Decimal,
    interest: Decimal,
    dividend: Decimal,
}

fn cash_only_totals(
    activities: &[&Activity],
    rates: &ExchangeRateSeries,
    start_date: NaiveDate,
    end_date: NaiveDate,
    errors: &mut Vec<SymbolError>,
) -> CashTotals {
    let mut totals = CashTotals::default();
    for activity in activities
        .iter()
        .filter(|a| a.date >= start_date && a.date <= end_date)
    {
        let amount = to_base(
            activity.amount(),
            &activity.currency,
            activity.date,
            rates,
            errors,
        );
        match activity.activity_type {
            ActivityType::Fee => totals.fees += amount,
            ActivityType::Interest => totals.interest += amount,
            ActivityType::Dividend => totals.dividend += amount,
            other => debug!("Ignoring cash-only {} activity {}", other, activity.id),
        }
    }
    totals
}

/// Cumulative liabilities by date, each at its booking-date rate.
fn liability_series(
    activities: &[&Activity],
    rates: &ExchangeRateSeries,
    errors: &mut Vec<SymbolError>,
) -> BTreeMap<NaiveDate, Decimal> {
    let mut series = BTreeMap::new();
    let mut running = Decimal::ZERO;
    for activity in activities {
        running += to_base(
            activity.amount(),
            &activity.currency,
            activity.date,
            rates,
            errors,
        );
        series.insert(activity.date, running);
    }
    series
}

fn cash_in_base_currency(
    balances: &[CashBalance],
    rates: &ExchangeRateSeries,
    end_date: NaiveDate,
    errors: &mut Vec<SymbolError>,
) -> Decimal {
    balances
        .iter()
        .map(|b| to_base(b.balance, &b.currency, end_date, rates, errors))
        .sum()
}

fn round_snapshot(snapshot: &mut PortfolioSnapshot) {
    for value in [
        &mut snapshot.current_value_in_base_currency,
        &mut snapshot.total_investment,
        &mut snapshot.total_investment_with_currency_effect,
        &mut snapshot.gross_performance,
        &mut snapshot.gross_performance_with_currency_effect,
        &mut snapshot.gross_performance_percentage,
        &mut snapshot.gross_performance_percentage_with_currency_effect,
        &mut snapshot.net_performance,
        &mut snapshot.net_performance_with_currency_effect,
        &mut snapshot.net_performance_percentage,
        &mut snapshot.net_performance_percentage_with_currency_effect,
        &mut snapshot.currency_effect,
        &mut snapshot.net_annualized_performance,
        &mut snapshot.net_annualized_performance_with_currency_effect,
        &mut snapshot.total_fees_with_currency_effect,
        &mut snapshot.total_interest_with_currency_effect,
        &mut snapshot.total_dividend_with_currency_effect,
        &mut snapshot.total_valuables_with_currency_effect,
        &mut snapshot.total_liabilities_with_currency_effect,
        &mut snapshot.cash_balance_in_base_currency,
        &mut snapshot.realized_performance_with_currency_effect,
    ] {
        *value = round_output(*value);
    }
}
