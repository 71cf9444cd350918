//! Core types used throughout SpreadBot
//!
//! Defines ticks, order-book levels, spread events and alerts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One live ticker update for a futures symbol
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    pub last_price: f64,
    /// 24h traded volume as reported by the feed
    pub volume_24h: f64,
    /// Local arrival time (Unix ms)
    pub ts: i64,
}

/// Order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Ask,
    Bid,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Ask => write!(f, "ask"),
            BookSide::Bid => write!(f, "bid"),
        }
    }
}

/// Single price level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub amount: f64,
}

impl BookLevel {
    pub fn new(price: f64, amount: f64) -> Self {
        Self { price, amount }
    }

    /// Quote value of the whole level
    pub fn value(&self) -> f64 {
        self.price * self.amount
    }

    fn is_valid(&self) -> bool {
        self.price.is_finite() && self.amount.is_finite() && self.price > 0.0 && self.amount > 0.0
    }
}

/// Depth snapshot for one symbol.
///
/// Asks are kept ascending by price and bids descending, so index 0 is always
/// the best level on either side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthSnapshot {
    pub symbol: String,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

impl DepthSnapshot {
    /// Drop unusable levels and restore best-first ordering on both sides.
    pub fn normalize_levels(&mut self) {
        self.asks.retain(BookLevel::is_valid);
        self.bids.retain(BookLevel::is_valid);
        self.asks.sort_by(|a, b| a.price.total_cmp(&b.price));
        self.bids.sort_by(|a, b| b.price.total_cmp(&a.price));
    }

    pub fn side(&self, side: BookSide) -> &[BookLevel] {
        match side {
            BookSide::Ask => &self.asks,
            BookSide::Bid => &self.bids,
        }
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }
}

/// Result of evaluating one tick against the oracle
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadEvent {
    pub symbol: String,
    pub token_id: String,
    pub vwap_ask: f64,
    pub oracle_price: f64,
    /// Symmetric percentage difference
    pub spread_pct: f64,
    pub volume_24h: f64,
    pub ts: i64,
}

/// Alert handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpreadAlert {
    pub symbol: String,
    pub vwap_ask: f64,
    pub oracle_price: f64,
    pub spread_pct: f64,
    pub volume_24h: f64,
    pub ts: i64,
}

impl From<&SpreadEvent> for SpreadAlert {
    fn from(event: &SpreadEvent) -> Self {
        Self {
            symbol: event.symbol.clone(),
            vwap_ask: event.vwap_ask,
            oracle_price: event.oracle_price,
            spread_pct: event.spread_pct,
            volume_24h: event.volume_24h,
            ts: event.ts,
        }
    }
}
