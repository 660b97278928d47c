/// Decimal precision for values exposed on snapshots
pub const DECIMAL_PRECISION: u32 = 6;

/// Quantity threshold for significant positions
pub const QUANTITY_THRESHOLD: &str = "0.00000001";

/// Calendar days used for annualization
pub const DAYS_PER_YEAR: i64 = 365;

/// Environment variable prefix for engine configuration
pub const CONFIG_ENV_PREFIX: &str = "FOLIO_";
