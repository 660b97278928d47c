//! Market data module - price models and the price resolver contract.

mod market_data_constants;
mod market_data_errors;
mod market_data_model;
mod market_data_traits;

// Re-export the public interface
pub use market_data_constants::*;
pub use market_data_model::{DataSource, PriceLookup, PriceSeries, SymbolKey};
pub use market_data_traits::MarketPriceResolverTrait;

// Re-export error types for convenience
pub use market_data_errors::MarketDataError;
