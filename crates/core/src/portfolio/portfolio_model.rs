use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::activities::Activity;
use crate::fx::normalize_currency_code;
use crate::portfolio::metrics::DateRange;
use crate::portfolio::performance::ReturnMethod;

/// Narrows which activities a snapshot is built from. Empty lists match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortfolioFilter {
    pub account_ids: Vec<String>,
    pub symbols: Vec<String>,
    pub asset_classes: Vec<String>,
}

impl PortfolioFilter {
    /// Sorted, deduplicated copy. Two filters selecting the same activities
    /// normalize to the same value.
    pub fn normalize(&self) -> Self {
        fn clean(values: &[String], upper: bool) -> Vec<String> {
            let mut out: Vec<String> = values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| if upper { v.to_uppercase() } else { v.to_string() })
                .collect();
            out.sort();
            out.dedup();
            out
        }

        Self {
            account_ids: clean(&self.account_ids, false),
            symbols: clean(&self.symbols, true),
            asset_classes: clean(&self.asset_classes, true),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_ids.is_empty() && self.symbols.is_empty() && self.asset_classes.is_empty()
    }

    pub fn matches_account(&self, account_id: &str) -> bool {
        self.account_ids.is_empty() || self.account_ids.iter().any(|id| id == account_id)
    }

    /// Whether the activity belongs to the filtered portfolio. Cash-only
    /// activities are kept unless the filter narrows by instrument.
    pub fn matches(&self, activity: &Activity) -> bool {
        if !self.matches_account(&activity.account_id) {
            return false;
        }
        match &activity.symbol_profile {
            Some(profile) => {
                let symbol_ok = self.symbols.is_empty()
                    || self
                        .symbols
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case(&profile.symbol));
                let class_ok = self.asset_classes.is_empty()
                    || profile.asset_class.as_deref().is_some_and(|class| {
                        self.asset_classes
                            .iter()
                            .any(|c| c.eq_ignore_ascii_case(class))
                    });
                symbol_ok && class_ok
            }
            None => self.symbols.is_empty() && self.asset_classes.is_empty(),
        }
    }
}

/// Current cash held in one account and currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashBalance {
    pub account_id: String,
    pub currency: String,
    pub balance: Decimal,
}

/// Everything that identifies one snapshot calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRequest {
    pub user_id: String,
    pub base_currency: String,
    #[serde(default)]
    pub filter: PortfolioFilter,
    #[serde(default)]
    pub range: DateRange,
    /// Last day of the calculation, usually today.
    pub end_date: NaiveDate,
    #[serde(default)]
    pub method: ReturnMethod,
}

impl SnapshotRequest {
    pub fn new(user_id: &str, base_currency: &str, end_date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            base_currency: normalize_currency_code(base_currency),
            filter: PortfolioFilter::default(),
            range: DateRange::default(),
            end_date,
            method: ReturnMethod::default(),
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_method(mut self, method: ReturnMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_filter(mut self, filter: PortfolioFilter) -> Self {
        self.filter = filter;
        self
    }
}
