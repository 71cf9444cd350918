//! Rate-limited, cached oracle lookups
//!
//! The oracle enforces one global rate limit, so every lookup goes through a
//! single lock that owns both the price cache and the throttle clock. A
//! lookup holds it from the freshness check until the cache write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::PriceOracle;
use crate::error::OracleError;

#[derive(Debug, Clone, Copy)]
pub struct QuoteCacheConfig {
    /// How long a fetched price is served without a new request
    pub ttl: Duration,
    /// Minimum gap between two outbound requests, across all tokens
    pub min_interval: Duration,
    /// Total request attempts per lookup when rate limited
    pub max_attempts: u32,
}

impl Default for QuoteCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            min_interval: Duration::from_millis(1_000),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    price: f64,
    fetched_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    last_request: Option<Instant>,
}

pub struct QuoteCache {
    oracle: Arc<dyn PriceOracle>,
    config: QuoteCacheConfig,
    state: Mutex<CacheState>,
    shutdown: CancellationToken,
}

impl QuoteCache {
    pub fn new(
        oracle: Arc<dyn PriceOracle>,
        config: QuoteCacheConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            oracle,
            config,
            state: Mutex::new(CacheState::default()),
            shutdown,
        }
    }

    /// Current price for `token`, from cache when fresh, otherwise from the
    /// oracle behind the global throttle.
    pub async fn get_price(&self, token: &str) -> Result<f64, OracleError> {
        let mut state = self.state.lock().await;

        if let Some(entry) = state.entries.get(token) {
            if entry.fetched_at.elapsed() < self.config.ttl {
                return Ok(entry.price);
            }
        }

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            if let Some(last) = state.last_request {
                let since = last.elapsed();
                if since < self.config.min_interval {
                    self.pause(self.config.min_interval - since).await?;
                }
            }

            // measured request-to-request, so stamp before awaiting the reply
            state.last_request = Some(Instant::now());

            match self.oracle.request_price(token).await {
                Ok(price) => {
                    state.entries.insert(
                        token.to_string(),
                        CacheEntry {
                            price,
                            fetched_at: Instant::now(),
                        },
                    );
                    debug!(token = %token, price = price, attempt = attempt, "Oracle price refreshed");
                    return Ok(price);
                }
                Err(e) if e.is_retryable() => {
                    if attempt == max_attempts {
                        break;
                    }
                    let backoff = Duration::from_secs(u64::from(attempt) * u64::from(attempt));
                    warn!(
                        token = %token,
                        attempt = attempt,
                        backoff_secs = backoff.as_secs(),
                        "Oracle rate limited, backing off"
                    );
                    self.pause(backoff).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(OracleError::RetriesExhausted(max_attempts))
    }

    /// Last fetched price and its age, fresh or not
    pub async fn peek(&self, token: &str) -> Option<(f64, Duration)> {
        let state = self.state.lock().await;
        state
            .entries
            .get(token)
            .map(|entry| (entry.price, entry.fetched_at.elapsed()))
    }

    async fn pause(&self, wait: Duration) -> Result<(), OracleError> {
        tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = self.shutdown.cancelled() => Err(OracleError::Cancelled),
        }
    }
}
