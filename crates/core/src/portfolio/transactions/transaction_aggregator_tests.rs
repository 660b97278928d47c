#[cfg(test)]
mod tests {
    use crate::activities::{Activity, ActivityType, SymbolProfile};
    use crate::errors::CalculatorError;
    use crate::fx::ExchangeRateSeries;
    use crate::market_data::DataSource;
    use crate::portfolio::transactions::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn tx(
        id: &str,
        activity_type: ActivityType,
        day: u32,
        quantity: Decimal,
        unit_price: Decimal,
        fee: Decimal,
    ) -> TransactionInput {
        TransactionInput {
            activity_id: id.to_string(),
            activity_type,
            date: d(day),
            quantity,
            unit_price,
            unit_price_in_base: unit_price,
            fee,
            fee_in_base: fee,
        }
    }

    #[test]
    fn test_moving_average_cost_basis() {
        let inputs = vec![
            tx("b1", ActivityType::Buy, 1, dec!(10), dec!(100), dec!(5)),
            tx("b2", ActivityType::Buy, 2, dec!(10), dec!(120), dec!(5)),
            tx("s1", ActivityType::Sell, 3, dec!(5), dec!(130), dec!(2)),
        ];
        let points = aggregate_transactions("AAPL", &inputs).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[1].quantity, dec!(20));
        assert_eq!(points[1].investment, dec!(2200));
        assert_eq!(points[1].average_price, dec!(110));

        let after_sell = &points[2];
        assert_eq!(after_sell.quantity, dec!(15));
        // Sell reduces investment by the sold share of the basis, not by proceeds
        assert_eq!(after_sell.investment, dec!(1650));
        assert_eq!(after_sell.average_price, dec!(110));
        assert_eq!(after_sell.realized_performance, dec!(100));
        assert_eq!(after_sell.fees, dec!(12));
        assert_eq!(after_sell.fees_on_date, dec!(2));
        assert_eq!(after_sell.cash_flow, dec!(-650));
        assert_eq!(after_sell.transaction_count, 3);
        assert_eq!(after_sell.first_buy_date, Some(d(1)));
        assert_eq!(after_sell.last_unit_price, dec!(130));
    }

    #[test]
    fn test_one_point_per_date_with_same_day_flows() {
        let inputs = vec![
            tx("b1", ActivityType::Buy, 1, dec!(10), dec!(100), dec!(1)),
            tx("b2", ActivityType::Buy, 1, dec!(5), dec!(100), dec!(1)),
            tx("d1", ActivityType::Dividend, 4, dec!(1), dec!(7.5), Decimal::ZERO),
        ];
        let points = aggregate_transactions("MSFT", &inputs).unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, d(1));
        assert_eq!(points[0].cash_flow, dec!(1500));
        assert_eq!(points[0].fees_on_date, dec!(2));

        // Same-day fields reset on the next date
        assert_eq!(points[1].cash_flow, Decimal::ZERO);
        assert_eq!(points[1].fees_on_date, Decimal::ZERO);
        assert_eq!(points[1].dividend, dec!(7.5));
        assert_eq!(points[1].quantity, dec!(15));
    }

    #[test]
    fn test_sell_beyond_holding_is_negative_quantity() {
        let inputs = vec![
            tx("b1", ActivityType::Buy, 1, dec!(10), dec!(100), Decimal::ZERO),
            tx("s1", ActivityType::Sell, 2, dec!(11), dec!(100), Decimal::ZERO),
        ];
        let err = aggregate_transactions("AAPL", &inputs).unwrap_err();
        assert_eq!(
            err,
            CalculatorError::NegativeQuantity {
                symbol: "AAPL".to_string(),
                date: d(2),
                held: dec!(10),
                sold: dec!(11),
            }
        );
    }

    #[test]
    fn test_same_date_ties_follow_input_order() {
        // Buy then sell on one day is valid; the reverse order is not.
        let buy_first = vec![
            tx("b1", ActivityType::Buy, 5, dec!(10), dec!(50), Decimal::ZERO),
            tx("s1", ActivityType::Sell, 5, dec!(10), dec!(55), Decimal::ZERO),
        ];
        let points = aggregate_transactions("X", &buy_first).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].quantity, Decimal::ZERO);
        assert_eq!(points[0].investment, Decimal::ZERO);
        assert_eq!(points[0].realized_performance, dec!(50));

        let sell_first = vec![buy_first[1].clone(), buy_first[0].clone()];
        assert!(matches!(
            aggregate_transactions("X", &sell_first),
            Err(CalculatorError::NegativeQuantity { .. })
        ));
    }

    #[test]
    fn test_full_sell_clears_basis_and_dust() {
        let inputs = vec![
            tx("b1", ActivityType::Buy, 1, dec!(3), dec!(10), Decimal::ZERO),
            tx("s1", ActivityType::Sell, 2, dec!(2.999999999), dec!(12), Decimal::ZERO),
        ];
        let points = aggregate_transactions("DUST", &inputs).unwrap();
        assert_eq!(points[1].quantity, Decimal::ZERO);
        assert_eq!(points[1].investment, Decimal::ZERO);
        assert_eq!(points[1].average_price, Decimal::ZERO);
    }

    #[test]
    fn test_out_of_order_input_is_rejected() {
        let inputs = vec![
            tx("b2", ActivityType::Buy, 3, dec!(1), dec!(1), Decimal::ZERO),
            tx("b1", ActivityType::Buy, 1, dec!(1), dec!(1), Decimal::ZERO),
        ];
        assert!(matches!(
            aggregate_transactions("X", &inputs),
            Err(CalculatorError::InvalidActivity(_))
        ));
    }

    #[test]
    fn test_liability_cannot_be_a_position() {
        let inputs = vec![tx("l1", ActivityType::Liability, 1, dec!(1), dec!(1000), Decimal::ZERO)];
        assert!(matches!(
            aggregate_transactions("LOAN", &inputs),
            Err(CalculatorError::UnsupportedActivityType(_))
        ));
    }

    #[test]
    fn test_currency_effect_tracks_trade_date_rates() {
        let mut buy = tx("b1", ActivityType::Buy, 1, dec!(10), dec!(100), dec!(1));
        buy.unit_price_in_base = dec!(90);
        buy.fee_in_base = dec!(0.9);
        let mut sell = tx("s1", ActivityType::Sell, 2, dec!(5), dec!(110), Decimal::ZERO);
        sell.unit_price_in_base = dec!(88);

        let points = aggregate_transactions("USDX", &[buy, sell]).unwrap();
        let last = &points[1];
        assert_eq!(last.investment, dec!(500));
        assert_eq!(last.investment_with_currency_effect, dec!(450));
        assert_eq!(last.realized_performance, dec!(50));
        assert_eq!(last.realized_performance_with_currency_effect, dec!(-10));
        assert_eq!(last.fees_with_currency_effect, dec!(0.9));
    }

    fn activity(currency: &str, activity_type: ActivityType) -> Activity {
        Activity {
            id: "a1".to_string(),
            account_id: "acc".to_string(),
            activity_type,
            symbol_profile: Some(SymbolProfile {
                symbol: "SAP".to_string(),
                data_source: DataSource::Yahoo,
                currency: "EUR".to_string(),
                asset_class: None,
            }),
            date: d(10),
            quantity: dec!(2),
            unit_price: dec!(100),
            fee: dec!(4),
            currency: currency.to_string(),
        }
    }

    fn chf_rates() -> ExchangeRateSeries {
        let mut rates = ExchangeRateSeries::new("CHF");
        rates.insert("EUR", d(1), dec!(0.95));
        rates.insert("USD", d(1), dec!(0.9));
        rates
    }

    #[test]
    fn test_convert_activity_in_instrument_currency() {
        let (input, missing) = convert_activity(&activity("EUR", ActivityType::Buy), "EUR", &chf_rates());
        assert!(missing.is_none());
        assert_eq!(input.unit_price, dec!(100));
        assert_eq!(input.unit_price_in_base, dec!(95));
        assert_eq!(input.fee, dec!(4));
        assert_eq!(input.fee_in_base, dec!(3.8));
    }

    #[test]
    fn test_convert_cross_currency_trade_through_base() {
        // Booked in USD, instrument in EUR, base CHF: 100 USD = 90 CHF = 90/0.95 EUR
        let (input, missing) = convert_activity(&activity("USD", ActivityType::Buy), "EUR", &chf_rates());
        assert!(missing.is_none());
        assert_eq!(input.unit_price.round_dp(4), dec!(94.7368));
        assert_eq!(input.unit_price_in_base, dec!(90));
    }

    #[test]
    fn test_convert_reports_missing_rate() {
        let (input, missing) = convert_activity(&activity("JPY", ActivityType::Buy), "EUR", &chf_rates());
        assert_eq!(missing.as_deref(), Some("JPY"));
        assert_eq!(input.unit_price, dec!(100));
        assert_eq!(input.unit_price_in_base, dec!(100));
    }

    #[test]
    fn test_convert_fee_activity_uses_amount() {
        let mut fee = activity("EUR", ActivityType::Fee);
        fee.fee = Decimal::ZERO;
        fee.quantity = dec!(1);
        fee.unit_price = dec!(12);
        let (input, _) = convert_activity(&fee, "EUR", &chf_rates());
        assert_eq!(input.fee, dec!(12));
        assert_eq!(input.fee_in_base, dec!(11.40));
    }
}
