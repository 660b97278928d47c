//! Core error types for the performance engine.
//!
//! Per-symbol data problems (missing prices or rates) are not errors at this
//! level: they are recorded on the symbol metrics and surfaced through the
//! snapshot. The types here are for failures that stop a calculation.

use chrono::{NaiveDate, ParseError as ChronoParseError};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;

use crate::fx::FxError;
use crate::market_data::MarketDataError;
use crate::portfolio::performance::ReturnMethod;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Portfolio calculation failed: {0}")]
    Calculation(#[from] CalculatorError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Fx error: {0}")]
    Fx(#[from] FxError),

    #[error("Snapshot cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Repository error: {0}")]
    Repository(String),

    /// A single failure delivered to every caller that waited on the same build.
    #[error(transparent)]
    Shared(Arc<Error>),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Returns the underlying error when this one was shared between waiters.
    pub fn root(&self) -> &Error {
        match self {
            Error::Shared(inner) => inner.root(),
            other => other,
        }
    }
}

/// Errors that occur during portfolio calculations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalculatorError {
    #[error("Invalid activity data: {0}")]
    InvalidActivity(String),

    #[error("Sell of {sold} {symbol} on {date} exceeds the {held} units held")]
    NegativeQuantity {
        symbol: String,
        date: NaiveDate,
        held: Decimal,
        sold: Decimal,
    },

    #[error("Unsupported activity type: {0}")]
    UnsupportedActivityType(String),

    #[error("{method} did not converge after {iterations} iterations: {reason}")]
    Convergence {
        method: ReturnMethod,
        iterations: u32,
        reason: String,
    },

    #[error("{method} overflowed the decimal range on {date}")]
    Overflow { method: ReturnMethod, date: NaiveDate },

    #[error("Calculation failed: {0}")]
    Calculation(String),
}

/// Errors raised by the snapshot cache.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Snapshot build for {fingerprint} exceeded the {budget_ms} ms budget")]
    Timeout { fingerprint: String, budget_ms: u64 },

    #[error("Cache store failure: {0}")]
    Store(String),
}

/// Validation errors for user input and data parsing.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Failed to parse decimal number: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Failed to parse date/time: {0}")]
    DateTimeParse(#[from] ChronoParseError),
}

// === From implementations for common error types ===

impl From<rust_decimal::Error> for Error {
    fn from(err: rust_decimal::Error) -> Self {
        Error::Validation(ValidationError::DecimalParse(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}

impl From<ChronoParseError> for Error {
    fn from(err: ChronoParseError) -> Self {
        Error::Validation(ValidationError::DateTimeParse(err))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}
