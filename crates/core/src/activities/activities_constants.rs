/// Activity types
///
/// Each constant represents one of the activity categories the engine folds
/// into transaction points.

/// Purchase of a security. Increases quantity and investment.
pub const ACTIVITY_TYPE_BUY: &str = "BUY";

/// Disposal of a security. Decreases quantity; investment shrinks at average cost.
pub const ACTIVITY_TYPE_SELL: &str = "SELL";

/// Cash dividend. Tracked separately from price performance.
pub const ACTIVITY_TYPE_DIVIDEND: &str = "DIVIDEND";

/// Interest earned. Tracked separately from price performance.
pub const ACTIVITY_TYPE_INTEREST: &str = "INTEREST";

/// Stand-alone fee, with or without an instrument.
pub const ACTIVITY_TYPE_FEE: &str = "FEE";

/// Manually valued asset (property, collectible). Held like a purchase.
pub const ACTIVITY_TYPE_VALUABLE: &str = "VALUABLE";

/// Debt owed. Subtracted from net worth, never a holding.
pub const ACTIVITY_TYPE_LIABILITY: &str = "LIABILITY";
