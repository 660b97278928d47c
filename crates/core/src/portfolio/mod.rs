//! Portfolio module - transactions, metrics, performance, snapshots and caching.

pub mod cache;
pub mod metrics;
pub mod performance;
pub mod portfolio_model;
pub mod portfolio_service;
pub mod snapshot;
pub mod transactions;

pub use cache::{CacheStoreTrait, MemoryCacheStore, SnapshotCache};
pub use metrics::{DateRange, SymbolError, SymbolErrorKind};
pub use performance::ReturnMethod;
pub use portfolio_model::{CashBalance, PortfolioFilter, SnapshotRequest};
pub use portfolio_service::{PortfolioService, PortfolioServiceTrait};
pub use snapshot::{HistoricalDataItem, PortfolioSnapshot, TimelinePosition};
