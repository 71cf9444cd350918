//! MEXC futures module
//!
//! Supports:
//! - Depth snapshots and 24h contract tickers over REST
//! - Live `push.ticker` updates over WebSocket, with reconnect supervision

mod feed;
mod rest;
mod websocket;

pub use feed::{reconnect_delay, spawn_feed, FeedSupervisor};
pub use rest::{ContractTicker, MexcRestClient};
pub use websocket::{
    decode_frame, is_gzip, pump_ticks, subscribe_symbols, TickerConnection, TickerStream,
};

use async_trait::async_trait;

use crate::error::RestError;
use crate::types::DepthSnapshot;

/// Source of 24h contract statistics, used by the symbol refresh job
#[async_trait]
pub trait ContractTickerSource: Send + Sync {
    async fn fetch_contract_tickers(&self) -> Result<Vec<ContractTicker>, RestError>;
}

/// Source of fresh order-book snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepthSource: Send + Sync {
    /// Both sides of the book for `symbol`, best level first.
    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<DepthSnapshot, RestError>;
}
