use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::activities_constants::*;
use crate::market_data::{DataSource, SymbolKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivityType {
    Buy,
    Sell,
    Dividend,
    Interest,
    Fee,
    Valuable,
    Liability,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Buy => ACTIVITY_TYPE_BUY,
            ActivityType::Sell => ACTIVITY_TYPE_SELL,
            ActivityType::Dividend => ACTIVITY_TYPE_DIVIDEND,
            ActivityType::Interest => ACTIVITY_TYPE_INTEREST,
            ActivityType::Fee => ACTIVITY_TYPE_FEE,
            ActivityType::Valuable => ACTIVITY_TYPE_VALUABLE,
            ActivityType::Liability => ACTIVITY_TYPE_LIABILITY,
        }
    }

    /// Activities that change the held quantity.
    pub fn is_trade(&self) -> bool {
        matches!(
            self,
            ActivityType::Buy | ActivityType::Sell | ActivityType::Valuable
        )
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            ACTIVITY_TYPE_BUY => Ok(ActivityType::Buy),
            ACTIVITY_TYPE_SELL => Ok(ActivityType::Sell),
            ACTIVITY_TYPE_DIVIDEND => Ok(ActivityType::Dividend),
            ACTIVITY_TYPE_INTEREST => Ok(ActivityType::Interest),
            ACTIVITY_TYPE_FEE => Ok(ActivityType::Fee),
            ACTIVITY_TYPE_VALUABLE => Ok(ActivityType::Valuable),
            ACTIVITY_TYPE_LIABILITY => Ok(ActivityType::Liability),
            _ => Err(format!("Unknown activity type: {}", s)),
        }
    }
}

/// Identity and listing currency of the instrument an activity refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolProfile {
    pub symbol: String,
    pub data_source: DataSource,
    /// Currency the instrument is priced in.
    pub currency: String,
    #[serde(default)]
    pub asset_class: Option<String>,
}

impl SymbolProfile {
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.symbol, self.data_source.clone())
    }
}

/// One recorded event of a user's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub account_id: String,
    pub activity_type: ActivityType,
    /// `None` for cash-only events (account fees, interest, liabilities).
    #[serde(default)]
    pub symbol_profile: Option<SymbolProfile>,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    /// Currency the activity was booked in.
    pub currency: String,
}

impl Activity {
    /// Gross amount of the activity (`quantity × unit price`).
    pub fn value(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// Cash amount of a non-trade activity. A `FEE` may carry its amount in
    /// the fee field only.
    pub fn amount(&self) -> Decimal {
        match self.activity_type {
            ActivityType::Fee if !self.fee.is_zero() => self.fee,
            _ => self.value(),
        }
    }

    pub fn symbol_key(&self) -> Option<SymbolKey> {
        self.symbol_profile.as_ref().map(SymbolProfile::key)
    }

    pub fn is_cash_only(&self) -> bool {
        self.symbol_profile.is_none()
    }

    /// Rejects values no valid activity can carry.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.quantity.is_sign_negative() && !self.quantity.is_zero() {
            return Err(format!(
                "Activity {} has negative quantity {}",
                self.id, self.quantity
            ));
        }
        if self.unit_price.is_sign_negative() && !self.unit_price.is_zero() {
            return Err(format!(
                "Activity {} has negative unit price {}",
                self.id, self.unit_price
            ));
        }
        if self.fee.is_sign_negative() && !self.fee.is_zero() {
            return Err(format!("Activity {} has negative fee {}", self.id, self.fee));
        }
        if self.activity_type.is_trade() && self.symbol_profile.is_none() {
            return Err(format!(
                "{} activity {} has no instrument",
                self.activity_type, self.id
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(format!("Activity {} has no currency", self.id));
        }
        Ok(())
    }
}

/// Sorts activities by date. The sort is stable: activities on the same date
/// keep the order they were supplied in.
pub fn sort_activities(activities: &mut [Activity]) {
    activities.sort_by_key(|a| a.date);
}
