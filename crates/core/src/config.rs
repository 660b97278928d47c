//! Engine configuration.
//!
//! Every tunable of the engine lives here rather than in hidden constants.
//! Values can be deserialized from any serde source or read from `FOLIO_*`
//! environment variables.

use log::warn;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::CONFIG_ENV_PREFIX;
use crate::errors::{Error, Result};

/// Bounds and termination criteria of the money-weighted return solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MwrSolverConfig {
    /// Lowest annualized rate searched (-0.99 = -99%).
    pub lower_bound: Decimal,
    /// Highest annualized rate searched (10 = +1000%).
    pub upper_bound: Decimal,
    pub max_iterations: u32,
    /// Convergence tolerance on both the rate step and the normalized NPV.
    pub tolerance: Decimal,
    pub initial_guess: Decimal,
}

impl Default for MwrSolverConfig {
    fn default() -> Self {
        Self {
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10),
            max_iterations: 100,
            tolerance: dec!(0.000000001),
            initial_guess: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Lifetime of a stored snapshot.
    pub ttl_secs: u64,
    /// Wall-clock budget of a single snapshot build.
    pub build_timeout_ms: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            build_timeout_ms: 30_000,
            max_capacity: 1_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_millis(self.build_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub mwr: MwrSolverConfig,
    pub cache: CacheConfig,
    /// A forward-filled price older than this many days is reported as stale.
    pub max_price_gap_days: i64,
    /// Number of symbols whose prices are fetched concurrently.
    pub price_fetch_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mwr: MwrSolverConfig::default(),
            cache: CacheConfig::default(),
            max_price_gap_days: 7,
            price_fetch_concurrency: 8,
        }
    }
}

impl EngineConfig {
    /// Reads overrides from `FOLIO_*` environment variables on top of the defaults.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            mwr: MwrSolverConfig {
                lower_bound: env_or("MWR_LOWER_BOUND", defaults.mwr.lower_bound),
                upper_bound: env_or("MWR_UPPER_BOUND", defaults.mwr.upper_bound),
                max_iterations: env_or("MWR_MAX_ITERATIONS", defaults.mwr.max_iterations),
                tolerance: env_or("MWR_TOLERANCE", defaults.mwr.tolerance),
                initial_guess: env_or("MWR_INITIAL_GUESS", defaults.mwr.initial_guess),
            },
            cache: CacheConfig {
                ttl_secs: env_or("CACHE_TTL_SECS", defaults.cache.ttl_secs),
                build_timeout_ms: env_or("CACHE_BUILD_TIMEOUT_MS", defaults.cache.build_timeout_ms),
                max_capacity: env_or("CACHE_MAX_CAPACITY", defaults.cache.max_capacity),
            },
            max_price_gap_days: env_or("MAX_PRICE_GAP_DAYS", defaults.max_price_gap_days),
            price_fetch_concurrency: env_or(
                "PRICE_FETCH_CONCURRENCY",
                defaults.price_fetch_concurrency,
            ),
        }
    }

    /// Rejects combinations the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.mwr.lower_bound <= dec!(-1) {
            return Err(Error::InvalidConfigValue(format!(
                "mwr.lowerBound must be greater than -1, got {}",
                self.mwr.lower_bound
            )));
        }
        if self.mwr.lower_bound >= self.mwr.upper_bound {
            return Err(Error::InvalidConfigValue(format!(
                "mwr.lowerBound {} must be below mwr.upperBound {}",
                self.mwr.lower_bound, self.mwr.upper_bound
            )));
        }
        if self.mwr.initial_guess < self.mwr.lower_bound
            || self.mwr.initial_guess > self.mwr.upper_bound
        {
            return Err(Error::InvalidConfigValue(format!(
                "mwr.initialGuess {} is outside [{}, {}]",
                self.mwr.initial_guess, self.mwr.lower_bound, self.mwr.upper_bound
            )));
        }
        if self.mwr.max_iterations == 0 {
            return Err(Error::InvalidConfigValue(
                "mwr.maxIterations must be positive".to_string(),
            ));
        }
        if self.mwr.tolerance <= Decimal::ZERO {
            return Err(Error::InvalidConfigValue(
                "mwr.tolerance must be positive".to_string(),
            ));
        }
        if self.cache.build_timeout_ms == 0 {
            return Err(Error::InvalidConfigValue(
                "cache.buildTimeoutMs must be positive".to_string(),
            ));
        }
        if self.max_price_gap_days < 0 {
            return Err(Error::InvalidConfigValue(
                "maxPriceGapDays must not be negative".to_string(),
            ));
        }
        if self.price_fetch_concurrency == 0 {
            return Err(Error::InvalidConfigValue(
                "priceFetchConcurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let name = format!("{}{}", CONFIG_ENV_PREFIX, key);
    match std::env::var(&name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid {}='{}', using default {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
