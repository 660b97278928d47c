use log::{debug, warn};
use rust_decimal::Decimal;

use super::transaction_model::{TransactionInput, TransactionPoint};
use crate::activities::{Activity, ActivityType};
use crate::errors::CalculatorError;
use crate::fx::{normalize_currency_code, ExchangeRateSeries};
use crate::utils::decimal_utils::{is_quantity_significant, safe_div};

/// Expresses an activity in the instrument currency and in the base
/// currency at its trade-date rate.
///
/// A trade booked in a third currency is converted through the base
/// currency. When a rate is unavailable the amount is taken unconverted and
/// the currency is returned so the caller can record it.
pub fn convert_activity(
    activity: &Activity,
    instrument_currency: &str,
    rates: &ExchangeRateSeries,
) -> (TransactionInput, Option<String>) {
    let activity_currency = normalize_currency_code(&activity.currency);
    let instrument_currency = normalize_currency_code(instrument_currency);
    let mut missing = None;

    let local_factor = if activity_currency == instrument_currency {
        Decimal::ONE
    } else {
        match rates.convert(Decimal::ONE, &activity_currency, &instrument_currency, activity.date) {
            Ok(factor) => factor,
            Err(e) => {
                warn!(
                    "Activity {}: no rate {}->{} on {}: {}. Using original amount.",
                    activity.id, activity_currency, instrument_currency, activity.date, e
                );
                missing = Some(activity_currency.clone());
                Decimal::ONE
            }
        }
    };

    let base_factor = match rates.get_rate(&activity_currency, activity.date) {
        Ok(rate) => rate,
        Err(e) => {
            warn!(
                "Activity {}: no rate {}->{} on {}: {}. Using original amount.",
                activity.id,
                activity_currency,
                rates.base_currency(),
                activity.date,
                e
            );
            missing = Some(activity_currency.clone());
            Decimal::ONE
        }
    };

    let fee = match activity.activity_type {
        ActivityType::Fee => activity.amount(),
        _ => activity.fee,
    };

    let input = TransactionInput {
        activity_id: activity.id.clone(),
        activity_type: activity.activity_type,
        date: activity.date,
        quantity: activity.quantity,
        unit_price: activity.unit_price * local_factor,
        unit_price_in_base: activity.unit_price * base_factor,
        fee: fee * local_factor,
        fee_in_base: fee * base_factor,
    };
    (input, missing)
}

/// Folds a symbol's chronologically sorted transactions into one
/// [`TransactionPoint`] per date.
///
/// Investment follows the moving-average cost basis: a sell removes the
/// sold share of the basis, independent of the sale price. Same-date
/// transactions are applied in the order given.
pub fn aggregate_transactions(
    symbol: &str,
    inputs: &[TransactionInput],
) -> Result<Vec<TransactionPoint>, CalculatorError> {
    let mut points: Vec<TransactionPoint> = Vec::new();
    let mut state = TransactionPoint::default();
    let mut open = false;

    for input in inputs {
        if open && input.date != state.date {
            if input.date < state.date {
                return Err(CalculatorError::InvalidActivity(format!(
                    "{}: activity {} on {} is out of order after {}",
                    symbol, input.activity_id, input.date, state.date
                )));
            }
            points.push(state.clone());
            open = false;
        }
        if !open {
            state.date = input.date;
            state.cash_flow = Decimal::ZERO;
            state.cash_flow_with_currency_effect = Decimal::ZERO;
            state.fees_on_date = Decimal::ZERO;
            state.fees_on_date_with_currency_effect = Decimal::ZERO;
            open = true;
        }
        apply_transaction(symbol, &mut state, input)?;
    }

    if open {
        points.push(state);
    }

    debug!("Aggregated {} into {} transaction points", symbol, points.len());
    Ok(points)
}

fn apply_transaction(
    symbol: &str,
    state: &mut TransactionPoint,
    input: &TransactionInput,
) -> Result<(), CalculatorError> {
    state.transaction_count += 1;
    state.fees += input.fee;
    state.fees_with_currency_effect += input.fee_in_base;
    state.fees_on_date += input.fee;
    state.fees_on_date_with_currency_effect += input.fee_in_base;

    match input.activity_type {
        ActivityType::Buy | ActivityType::Valuable => {
            let value = input.value();
            let value_in_base = input.value_in_base();
            state.quantity += input.quantity;
            state.investment += value;
            state.investment_with_currency_effect += value_in_base;
            state.cash_flow += value;
            state.cash_flow_with_currency_effect += value_in_base;
            state.last_unit_price = input.unit_price;
            state.first_buy_date.get_or_insert(input.date);
            if input.activity_type == ActivityType::Valuable {
                state.is_valuable = true;
            }
        }
        ActivityType::Sell => {
            let excess = input.quantity - state.quantity;
            if excess > Decimal::ZERO && is_quantity_significant(&excess) {
                return Err(CalculatorError::NegativeQuantity {
                    symbol: symbol.to_string(),
                    date: input.date,
                    held: state.quantity,
                    sold: input.quantity,
                });
            }

            let ratio = safe_div(input.quantity, state.quantity).min(Decimal::ONE);
            let cost = state.investment * ratio;
            let cost_with_currency_effect = state.investment_with_currency_effect * ratio;
            let proceeds = input.value();
            let proceeds_in_base = input.value_in_base();

            state.realized_performance += proceeds - cost;
            state.realized_performance_with_currency_effect +=
                proceeds_in_base - cost_with_currency_effect;
            state.investment -= cost;
            state.investment_with_currency_effect -= cost_with_currency_effect;
            state.quantity -= input.quantity;
            if !is_quantity_significant(&state.quantity) {
                state.quantity = Decimal::ZERO;
                state.investment = Decimal::ZERO;
                state.investment_with_currency_effect = Decimal::ZERO;
            }
            state.cash_flow -= proceeds;
            state.cash_flow_with_currency_effect -= proceeds_in_base;
            state.last_unit_price = input.unit_price;
        }
        ActivityType::Dividend => {
            state.dividend += input.value();
            state.dividend_with_currency_effect += input.value_in_base();
        }
        ActivityType::Interest => {
            state.interest += input.value();
            state.interest_with_currency_effect += input.value_in_base();
        }
        // Amount already booked as fee above.
        ActivityType::Fee => {}
        ActivityType::Liability => {
            return Err(CalculatorError::UnsupportedActivityType(format!(
                "{} activity {} cannot be held as a position of {}",
                input.activity_type, input.activity_id, symbol
            )));
        }
    }

    state.average_price = safe_div(state.investment, state.quantity);
    Ok(())
}
