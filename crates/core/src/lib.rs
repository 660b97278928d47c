//! Folio Core - portfolio performance calculation engine.
//!
//! Reconstructs holding-level and portfolio-level investment and performance
//! series from a user's activity history, market prices and exchange rates.
//! Storage, price and rate resolution are collaborators behind traits; this
//! crate only computes and caches.

pub mod activities;
pub mod config;
pub mod constants;
pub mod errors;
pub mod fx;
pub mod market_data;
pub mod portfolio;
pub mod utils;

pub use config::EngineConfig;
pub use portfolio::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
