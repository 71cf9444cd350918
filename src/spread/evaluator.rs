//! Spread Evaluator
//!
//! One tick in, one [`SpreadEvent`] out: token lookup, fresh depth, ask-side
//! VWAP, oracle price, symmetric spread. The first failing stage ends the
//! evaluation.

use std::sync::Arc;
use tracing::{debug, warn};

use super::vwap::compute_vwap;
use crate::error::EvalError;
use crate::mexc::DepthSource;
use crate::oracle::QuoteCache;
use crate::registry::TokenRegistry;
use crate::types::{BookSide, SpreadEvent, Tick};

/// Symmetric percentage difference between two prices.
///
/// `100 * |a - b| / ((a + b) / 2)`; zero when both are zero.
pub fn spread_pct(a: f64, b: f64) -> f64 {
    let mid = (a + b) / 2.0;
    if mid == 0.0 {
        return 0.0;
    }
    100.0 * (a - b).abs() / mid
}

pub struct SpreadEvaluator {
    depth: Arc<dyn DepthSource>,
    quotes: Arc<QuoteCache>,
    registry: Arc<TokenRegistry>,
    depth_limit: usize,
    vwap_notional: f64,
}

impl SpreadEvaluator {
    pub fn new(
        depth: Arc<dyn DepthSource>,
        quotes: Arc<QuoteCache>,
        registry: Arc<TokenRegistry>,
        depth_limit: usize,
        vwap_notional: f64,
    ) -> Self {
        Self {
            depth,
            quotes,
            registry,
            depth_limit,
            vwap_notional,
        }
    }

    pub async fn evaluate(&self, tick: &Tick) -> Result<SpreadEvent, EvalError> {
        let symbol = tick.symbol.as_str();

        let token = self
            .registry
            .token_for(symbol)
            .ok_or_else(|| EvalError::UnmappedSymbol(symbol.to_string()))?;

        let book = self
            .depth
            .fetch_depth(symbol, self.depth_limit)
            .await
            .map_err(|source| EvalError::Depth {
                symbol: symbol.to_string(),
                source,
            })?;

        let asks = book.side(BookSide::Ask);
        let vwap = compute_vwap(asks, self.vwap_notional, BookSide::Ask).map_err(
            |source| EvalError::Liquidity {
                symbol: symbol.to_string(),
                source,
            },
        )?;

        if !vwap.is_complete(self.vwap_notional) {
            warn!(
                symbol = %symbol,
                target = self.vwap_notional,
                filled = vwap.filled_notional,
                "Ask book thinner than target notional, using partial fill"
            );
        }

        let oracle_price = match self.quotes.get_price(token).await {
            Ok(price) => price,
            Err(source) => {
                if let Some((stale, age)) = self.quotes.peek(token).await {
                    debug!(
                        symbol = %symbol,
                        stale_price = stale,
                        age_secs = age.as_secs(),
                        "Oracle lookup failed, last known price is stale"
                    );
                }
                return Err(EvalError::Oracle {
                    symbol: symbol.to_string(),
                    source,
                });
            }
        };

        let spread = spread_pct(vwap.avg_price, oracle_price);
        debug!(
            symbol = %symbol,
            tick_bid = tick.bid,
            tick_ask = tick.ask,
            last = tick.last_price,
            best_bid = book.best_bid().map(|l| l.price),
            best_ask = book.best_ask().map(|l| l.price),
            vwap_ask = vwap.avg_price,
            oracle = oracle_price,
            spread_pct = spread,
            "Tick evaluated"
        );

        Ok(SpreadEvent {
            symbol: symbol.to_string(),
            token_id: token.to_string(),
            vwap_ask: vwap.avg_price,
            oracle_price,
            spread_pct: spread,
            volume_24h: tick.volume_24h,
            ts: tick.ts,
        })
    }
}
