//! Error taxonomy for the spread pipeline.
//!
//! Feed errors are fatal to a connection; everything else is scoped to a
//! single tick and only drops that tick.

use reqwest::StatusCode;
use thiserror::Error;

use crate::types::BookSide;

#[derive(Debug, Error)]
pub enum FeedError {
    /// The stream could not be started (dial or subscription failed).
    #[error("connection failed: {0}")]
    Connection(String),

    /// The running connection died; recoverable by reconnecting.
    #[error("stream failed: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum RestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("not enough liquidity on {side} side for {target_notional:.2} USD")]
pub struct LiquidityError {
    pub side: BookSide,
    pub target_notional: f64,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("oracle rate limit hit")]
    RateLimited,

    #[error("oracle returned status {0}")]
    Status(StatusCode),

    #[error("oracle response has no price for {0}")]
    MissingPrice(String),

    #[error("oracle price for {token} is not a number: {raw:?}")]
    InvalidPrice { token: String, raw: String },

    #[error("oracle still rate limited after {0} attempts")]
    RetriesExhausted(u32),

    #[error("oracle lookup cancelled")]
    Cancelled,
}

impl OracleError {
    /// Only rate-limit responses are worth retrying within one lookup.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::RateLimited)
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("no oracle token mapped for {0}")]
    UnmappedSymbol(String),

    #[error("depth fetch failed for {symbol}: {source}")]
    Depth {
        symbol: String,
        #[source]
        source: RestError,
    },

    #[error("vwap failed for {symbol}: {source}")]
    Liquidity {
        symbol: String,
        #[source]
        source: LiquidityError,
    },

    #[error("oracle lookup failed for {symbol}: {source}")]
    Oracle {
        symbol: String,
        #[source]
        source: OracleError,
    },
}

impl EvalError {
    /// Short stage label for structured logs
    pub fn stage(&self) -> &'static str {
        match self {
            EvalError::UnmappedSymbol(_) => "registry",
            EvalError::Depth { .. } => "depth",
            EvalError::Liquidity { .. } => "vwap",
            EvalError::Oracle { .. } => "oracle",
        }
    }
}
