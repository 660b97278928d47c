//! Tests for Activity domain models.

#[cfg(test)]
mod tests {
    use crate::activities::activities_model::*;
    use crate::market_data::DataSource;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn activity(id: &str, activity_type: ActivityType, day: u32) -> Activity {
        Activity {
            id: id.to_string(),
            account_id: "acc-1".to_string(),
            activity_type,
            symbol_profile: Some(SymbolProfile {
                symbol: "AAPL".to_string(),
                data_source: DataSource::Yahoo,
                currency: "USD".to_string(),
                asset_class: Some("EQUITY".to_string()),
            }),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            quantity: dec!(2),
            unit_price: dec!(150.5),
            fee: dec!(1),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn test_activity_type_round_trips_through_str() {
        for activity_type in [
            ActivityType::Buy,
            ActivityType::Sell,
            ActivityType::Dividend,
            ActivityType::Interest,
            ActivityType::Fee,
            ActivityType::Valuable,
            ActivityType::Liability,
        ] {
            assert_eq!(
                ActivityType::from_str(activity_type.as_str()).unwrap(),
                activity_type
            );
        }
        assert_eq!(ActivityType::from_str("buy").unwrap(), ActivityType::Buy);
        assert!(ActivityType::from_str("SPLIT").is_err());
    }

    #[test]
    fn test_activity_type_serialization() {
        assert_eq!(
            serde_json::to_string(&ActivityType::Liability).unwrap(),
            r#""LIABILITY""#
        );
        let parsed: ActivityType = serde_json::from_str(r#""VALUABLE""#).unwrap();
        assert_eq!(parsed, ActivityType::Valuable);
    }

    #[test]
    fn test_activity_value_and_key() {
        let buy = activity("a1", ActivityType::Buy, 1);
        assert_eq!(buy.value(), dec!(301));
        let key = buy.symbol_key().unwrap();
        assert_eq!(key.symbol, "AAPL");
        assert_eq!(key.data_source, DataSource::Yahoo);
        assert!(!buy.is_cash_only());
    }

    #[test]
    fn test_activity_deserializes_camel_case_without_optional_fields() {
        let json = r#"{
            "id": "fee-1",
            "accountId": "acc-1",
            "activityType": "FEE",
            "date": "2024-03-05",
            "quantity": 0,
            "unitPrice": 0,
            "currency": "EUR"
        }"#;
        let parsed: Activity = serde_json::from_str(json).unwrap();
        assert!(parsed.is_cash_only());
        assert_eq!(parsed.fee, Decimal::ZERO);
        assert_eq!(parsed.activity_type, ActivityType::Fee);
    }

    #[test]
    fn test_fee_amount_prefers_fee_field() {
        let mut fee = activity("f1", ActivityType::Fee, 2);
        fee.symbol_profile = None;
        fee.fee = dec!(12.5);
        assert_eq!(fee.amount(), dec!(12.5));

        fee.fee = Decimal::ZERO;
        assert_eq!(fee.amount(), dec!(301));

        assert_eq!(activity("d1", ActivityType::Dividend, 2).amount(), dec!(301));
    }

    #[test]
    fn test_validate_rejects_trade_without_instrument() {
        let mut buy = activity("a1", ActivityType::Buy, 1);
        buy.symbol_profile = None;
        assert!(buy.validate().is_err());

        let mut negative = activity("a2", ActivityType::Sell, 1);
        negative.quantity = dec!(-1);
        assert!(negative.validate().is_err());

        assert!(activity("a3", ActivityType::Dividend, 1).validate().is_ok());
    }

    #[test]
    fn test_sort_activities_is_stable_for_same_date() {
        let mut activities = vec![
            activity("late", ActivityType::Buy, 9),
            activity("same-first", ActivityType::Buy, 4),
            activity("same-second", ActivityType::Sell, 4),
            activity("early", ActivityType::Buy, 1),
        ];
        sort_activities(&mut activities);
        let ids: Vec<&str> = activities.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "same-first", "same-second", "late"]);
    }
}
