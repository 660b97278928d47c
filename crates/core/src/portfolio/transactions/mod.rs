//! Transaction aggregation - folds one symbol's activities into cumulative
//! checkpoints.

mod transaction_aggregator;
mod transaction_model;

pub use transaction_aggregator::*;
pub use transaction_model::*;

#[cfg(test)]
mod transaction_aggregator_tests;
