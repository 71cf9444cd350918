//! Spread detection engines
//!
//! - `vwap`: executable price for a target notional
//! - `evaluator`: tick → spread event
//! - `dedup`: cooldown gate in front of alert dispatch

mod dedup;
mod evaluator;
mod vwap;

pub use dedup::{DedupConfig, DedupGate, DedupState};
pub use evaluator::{spread_pct, SpreadEvaluator};
pub use vwap::{compute_vwap, VwapResult};
