//! Oracle module - reference prices from the Jupiter price API
//!
//! `PriceOracle` is the raw transport; `QuoteCache` layers the TTL cache,
//! the global request throttle and rate-limit backoff on top of it.

mod jupiter;
mod quote_cache;

pub use jupiter::JupiterClient;
pub use quote_cache::{QuoteCache, QuoteCacheConfig};

use async_trait::async_trait;

use crate::error::OracleError;

/// One outbound price request per call; no caching or retrying.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetch the current price of `token`.
    ///
    /// Must map a rate-limit response to `OracleError::RateLimited`.
    async fn request_price(&self, token: &str) -> Result<f64, OracleError>;
}
