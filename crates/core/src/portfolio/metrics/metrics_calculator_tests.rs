#[cfg(test)]
mod tests {
    use crate::activities::{ActivityType, SymbolProfile};
    use crate::fx::ExchangeRateSeries;
    use crate::market_data::{DataSource, PriceSeries};
    use crate::portfolio::metrics::*;
    use crate::portfolio::transactions::{aggregate_transactions, TransactionInput, TransactionPoint};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn profile(currency: &str) -> SymbolProfile {
        SymbolProfile {
            symbol: "AAPL".to_string(),
            data_source: DataSource::Yahoo,
            currency: currency.to_string(),
            asset_class: Some("EQUITY".to_string()),
        }
    }

    fn buy(day: u32, quantity: Decimal, price: Decimal, price_in_base: Decimal, fee: Decimal) -> TransactionInput {
        TransactionInput {
            activity_id: format!("buy-{}", day),
            activity_type: ActivityType::Buy,
            date: jan(day),
            quantity,
            unit_price: price,
            unit_price_in_base: price_in_base,
            fee,
            fee_in_base: fee,
        }
    }

    /// 100 every day from Jan 1 to Jan 29, 110 on Jan 30.
    fn daily_prices() -> PriceSeries {
        let mut prices: PriceSeries = (1..30).map(|day| (jan(day), dec!(100))).collect();
        prices.insert(jan(30), dec!(110));
        prices
    }

    fn run(
        profile: &SymbolProfile,
        points: &[TransactionPoint],
        prices: &PriceSeries,
        rates: &ExchangeRateSeries,
        start: NaiveDate,
    ) -> SymbolMetrics {
        calculate_symbol_metrics(&SymbolMetricsInput {
            profile,
            points,
            prices,
            rates,
            start_date: start,
            end_date: jan(30),
            max_price_gap_days: 7,
        })
    }

    #[test]
    fn test_buy_and_hold_end_to_end() {
        let profile = profile("USD");
        let points =
            aggregate_transactions("AAPL", &[buy(1, dec!(10), dec!(100), dec!(100), dec!(5))]).unwrap();
        let rates = ExchangeRateSeries::new("USD");
        let metrics = run(&profile, &points, &daily_prices(), &rates, jan(1));

        assert!(!metrics.has_errors);
        assert_eq!(metrics.current_value, dec!(1100));
        assert_eq!(metrics.total_investment, dec!(1000));
        assert_eq!(metrics.gross_performance, dec!(100));
        assert_eq!(metrics.total_fees, dec!(5));
        assert_eq!(metrics.net_performance, dec!(95));
        assert_eq!(metrics.gross_performance_percentage, dec!(0.1));
        assert_eq!(metrics.net_performance_percentage, dec!(0.095));
        assert_eq!(metrics.market_price, dec!(110));
        assert_eq!(metrics.initial_value, dec!(1000));
        assert_eq!(metrics.time_weighted_investment, dec!(1000));
        assert_eq!(metrics.first_buy_date, Some(jan(1)));
        // Day one loses the fee, the last day gains 10%
        assert_eq!(metrics.time_weighted_performance, dec!(0.0945));
        assert_eq!(
            metrics.net_performance_by_range_with_currency_effect[&DateRange::Max],
            dec!(95)
        );
        assert_eq!(
            metrics.net_performance_percentage_by_range_with_currency_effect[&DateRange::Max],
            dec!(0.095)
        );
        // 1d: only the last day's move
        assert_eq!(
            metrics.net_performance_by_range_with_currency_effect[&DateRange::OneDay],
            dec!(100)
        );
        assert_eq!(metrics.current_values.len(), 30);
    }

    #[test]
    fn test_value_equals_investment_plus_net_plus_fees_every_day() {
        let profile = profile("USD");
        let inputs = vec![
            buy(1, dec!(10), dec!(100), dec!(100), dec!(5)),
            buy(10, dec!(4), dec!(101), dec!(101), dec!(2)),
            TransactionInput {
                activity_id: "sell".to_string(),
                activity_type: ActivityType::Sell,
                date: jan(20),
                quantity: dec!(7),
                unit_price: dec!(104),
                unit_price_in_base: dec!(104),
                fee: dec!(1.5),
                fee_in_base: dec!(1.5),
            },
        ];
        let points = aggregate_transactions("AAPL", &inputs).unwrap();
        let metrics = run(&profile, &points, &daily_prices(), &ExchangeRateSeries::new("USD"), jan(1));

        for (date, value) in &metrics.current_values {
            let rebuilt = metrics.investment_values[date]
                + metrics.net_performance_values[date]
                + metrics.fee_values[date];
            assert_eq!(*value, rebuilt, "on {}", date);
            assert_eq!(
                metrics.gross_performance_values[date] - metrics.fee_values[date],
                metrics.net_performance_values[date]
            );
        }
        assert_eq!(metrics.quantity, dec!(7));
    }

    #[test]
    fn test_missing_prices_fall_back_to_trade_price() {
        let profile = profile("USD");
        let points =
            aggregate_transactions("AAPL", &[buy(3, dec!(2), dec!(50), dec!(50), Decimal::ZERO)]).unwrap();
        let metrics = run(
            &profile,
            &points,
            &PriceSeries::default(),
            &ExchangeRateSeries::new("USD"),
            jan(1),
        );

        assert!(metrics.has_errors);
        assert_eq!(metrics.errors.len(), 1);
        assert_eq!(
            metrics.errors[0].kind,
            SymbolErrorKind::MissingMarketPrice { date: jan(3) }
        );
        assert_eq!(metrics.current_value, dec!(100));
        assert_eq!(metrics.gross_performance, Decimal::ZERO);
        // Days before the first buy are part of the range but hold nothing
        assert_eq!(metrics.current_values[&jan(1)], Decimal::ZERO);
    }

    #[test]
    fn test_old_prices_are_reported_stale_once() {
        let profile = profile("USD");
        let points =
            aggregate_transactions("AAPL", &[buy(1, dec!(1), dec!(100), dec!(100), Decimal::ZERO)]).unwrap();
        let prices: PriceSeries = vec![(jan(1), dec!(100))].into_iter().collect();
        let metrics = run(&profile, &points, &prices, &ExchangeRateSeries::new("USD"), jan(1));

        assert_eq!(
            metrics.errors,
            vec![SymbolError::new(
                "AAPL",
                DataSource::Yahoo,
                SymbolErrorKind::StaleMarketPrice {
                    last_price_date: jan(1)
                },
                format!("Price of AAPL on {} is 8 days old", jan(9)),
            )]
        );
        assert_eq!(metrics.current_value, dec!(100));
    }

    #[test]
    fn test_manual_instruments_do_not_report_price_gaps() {
        let mut profile = profile("USD");
        profile.data_source = DataSource::Manual;
        let points =
            aggregate_transactions("HOUSE", &[buy(1, dec!(1), dec!(500000), dec!(500000), Decimal::ZERO)])
                .unwrap();
        let metrics = run(
            &profile,
            &points,
            &PriceSeries::default(),
            &ExchangeRateSeries::new("USD"),
            jan(1),
        );
        assert!(!metrics.has_errors);
        assert_eq!(metrics.current_value, dec!(500000));
    }

    #[test]
    fn test_currency_effect_uses_trade_date_rate_for_investment() {
        let profile = profile("EUR");
        let mut rates = ExchangeRateSeries::new("CHF");
        rates.insert("EUR", jan(1), dec!(0.95));
        rates.insert("EUR", jan(30), dec!(1.0));
        let points =
            aggregate_transactions("AAPL", &[buy(1, dec!(10), dec!(100), dec!(95), Decimal::ZERO)]).unwrap();
        let metrics = run(&profile, &points, &daily_prices(), &rates, jan(1));

        assert_eq!(metrics.exchange_rate, dec!(1.0));
        assert_eq!(metrics.gross_performance, dec!(100));
        assert_eq!(metrics.current_value_with_currency_effect, dec!(1100));
        assert_eq!(metrics.total_investment_with_currency_effect, dec!(950));
        assert_eq!(metrics.gross_performance_with_currency_effect, dec!(150));
        // Jan 29 is still valued at the Jan 1 rate
        assert_eq!(metrics.current_values_with_currency_effect[&jan(29)], dec!(950));
    }

    #[test]
    fn test_range_start_after_first_buy_uses_investment_at_range_start() {
        let profile = profile("USD");
        let points =
            aggregate_transactions("AAPL", &[buy(1, dec!(10), dec!(100), dec!(100), dec!(5))]).unwrap();
        let metrics = run(&profile, &points, &daily_prices(), &ExchangeRateSeries::new("USD"), jan(15));

        assert_eq!(metrics.initial_value, dec!(1000));
        assert_eq!(metrics.gross_performance, dec!(100));
        // The fee was paid before the range
        assert_eq!(metrics.total_fees, Decimal::ZERO);
        assert_eq!(metrics.net_performance, dec!(100));
        assert_eq!(metrics.time_weighted_performance, dec!(0.1));
        // Series still start at the first activity
        assert_eq!(metrics.current_values.keys().next(), Some(&jan(1)));
    }

    #[test]
    fn test_missing_exchange_rate_converts_at_one() {
        let profile = profile("JPY");
        let points =
            aggregate_transactions("AAPL", &[buy(1, dec!(1), dec!(100), dec!(100), Decimal::ZERO)]).unwrap();
        let metrics = run(&profile, &points, &daily_prices(), &ExchangeRateSeries::new("USD"), jan(1));

        assert!(metrics.has_errors);
        assert!(metrics.errors.iter().any(|e| e.kind
            == SymbolErrorKind::MissingExchangeRate {
                currency: "JPY".to_string()
            }));
        assert_eq!(metrics.current_value_with_currency_effect, dec!(110));
    }

    #[test]
    fn test_time_weighted_overflow_is_reported_not_panicked() {
        // Trade prices far below market make every first-day return enormous
        let tiny = dec!(0.00000000000000000001);
        let inputs: Vec<TransactionInput> =
            (1..=8).map(|day| buy(day, dec!(1), tiny, tiny, Decimal::ZERO)).collect();
        let points = aggregate_transactions("AAPL", &inputs).unwrap();
        let prices: PriceSeries = (1..=30).map(|day| (jan(day), dec!(100000000))).collect();
        let rates = ExchangeRateSeries::new("USD");

        let metrics = run(&profile("USD"), &points, &prices, &rates, jan(1));

        assert!(metrics.has_errors);
        assert_eq!(metrics.errors.len(), 1);
        assert_eq!(
            metrics.errors[0].kind,
            SymbolErrorKind::CalculationOverflow { date: jan(8) }
        );
        assert!(!metrics.errors[0].is_integrity());
        assert_eq!(metrics.quantity, dec!(8));
        assert_eq!(metrics.current_value, dec!(800000000));
        assert_eq!(
            metrics.time_weighted_performance_values[&jan(30)],
            metrics.time_weighted_performance_values[&jan(7)]
        );
        assert!(metrics.time_weighted_performance_values[&jan(7)] > Decimal::ZERO);
    }

    #[test]
    fn test_no_points_yields_empty_metrics() {
        let profile = profile("USD");
        let metrics = run(
            &profile,
            &[],
            &PriceSeries::default(),
            &ExchangeRateSeries::new("USD"),
            jan(1),
        );
        assert!(metrics.current_values.is_empty());
        assert_eq!(metrics.net_performance_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_date_range_intervals() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(); // Thursday
        let first = Some(NaiveDate::from_ymd_opt(2022, 6, 1).unwrap());

        assert_eq!(DateRange::OneDay.interval(end, first), Some((end, end)));
        assert_eq!(
            DateRange::WeekToDate.interval(end, first),
            Some((NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(), end))
        );
        assert_eq!(
            DateRange::OneYear.interval(end, first),
            Some((NaiveDate::from_ymd_opt(2023, 3, 15).unwrap(), end))
        );
        // Clamped to the first activity
        assert_eq!(DateRange::FiveYears.interval(end, first), Some((first.unwrap(), end)));
        assert_eq!(DateRange::Max.interval(end, first), Some((first.unwrap(), end)));
        assert_eq!(
            DateRange::Year(2023).interval(end, first),
            Some((
                NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
            ))
        );
        assert_eq!(DateRange::Year(2021).interval(end, first), None);
        assert_eq!(DateRange::standard_ranges(end, first).len(), 7 + 3);
    }

    #[test]
    fn test_date_range_strings() {
        for key in ["1d", "wtd", "mtd", "ytd", "1y", "5y", "max", "2023"] {
            let range: DateRange = key.parse().unwrap();
            assert_eq!(range.to_string(), key);
        }
        assert!("10y".parse::<DateRange>().is_err());
        assert_eq!(serde_json::to_string(&DateRange::YearToDate).unwrap(), r#""ytd""#);
        let parsed: DateRange = serde_json::from_str(r#""2020""#).unwrap();
        assert_eq!(parsed, DateRange::Year(2020));
    }
}
