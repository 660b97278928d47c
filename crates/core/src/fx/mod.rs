//! FX module - exchange rate series and the resolver contract.

mod fx_errors;
mod fx_model;
mod fx_traits;

pub use fx_errors::FxError;
pub use fx_model::{normalize_currency_code, ExchangeRateSeries};
pub use fx_traits::ExchangeRateResolverTrait;
