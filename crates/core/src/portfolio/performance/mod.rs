//! Return methodologies and annualization.

pub mod annualization;
pub mod money_weighted;
mod performance_model;
pub mod time_weighted;

pub use annualization::*;
pub use money_weighted::*;
pub use performance_model::*;
pub use time_weighted::*;
