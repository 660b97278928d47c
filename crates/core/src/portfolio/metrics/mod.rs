//! Symbol metrics - day-by-day valuation and performance of one holding.

mod metrics_calculator;
mod metrics_model;

pub use metrics_calculator::*;
pub use metrics_model::*;

#[cfg(test)]
mod metrics_calculator_tests;
