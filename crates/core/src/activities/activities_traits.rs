use super::activities_model::Activity;
use crate::portfolio::{CashBalance, PortfolioFilter};
use crate::Result;

/// Read-only access to the activity store. The engine never writes back.
pub trait ActivityRepositoryTrait: Send + Sync {
    /// Activities of a user, optionally narrowed by the filter. Order is not
    /// relied upon; the engine sorts by date itself.
    fn get_activities(&self, user_id: &str, filter: &PortfolioFilter) -> Result<Vec<Activity>>;

    /// Current cash balances of the user's accounts matching the filter.
    fn get_cash_balances(&self, user_id: &str, filter: &PortfolioFilter)
        -> Result<Vec<CashBalance>>;

    /// Opaque marker that changes whenever the user's stored data changes.
    /// Part of the snapshot fingerprint.
    fn get_data_version(&self, user_id: &str) -> Result<String>;
}
