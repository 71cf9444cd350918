//! VWAP Engine - executable price for a target notional
//!
//! Walks one side of the book best-first until the notional is covered.

use crate::error::LiquidityError;
use crate::types::{BookLevel, BookSide};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VwapResult {
    pub avg_price: f64,
    /// Base amount consumed from the book
    pub filled_amount: f64,
    /// Quote value actually filled (<= target when the book runs out)
    pub filled_notional: f64,
}

impl VwapResult {
    /// Whether the walk covered the requested notional
    pub fn is_complete(&self, target_notional: f64) -> bool {
        self.filled_notional + 1e-9 * target_notional.abs().max(1.0) >= target_notional
    }
}

/// Compute the volume-weighted price needed to fill `target_notional` against
/// `levels`, which must already be ordered best-first.
///
/// A book that runs out before the target is still accepted with whatever
/// was accumulated; only an empty fill is an error.
pub fn compute_vwap(
    levels: &[BookLevel],
    target_notional: f64,
    side: BookSide,
) -> Result<VwapResult, LiquidityError> {
    let mut cost = 0.0;
    let mut amount = 0.0;

    for level in levels {
        if level.price <= 0.0 || level.amount <= 0.0 {
            continue;
        }

        let remaining = target_notional - cost;
        if remaining <= 0.0 {
            break;
        }

        if level.value() >= remaining {
            let partial = remaining / level.price;
            cost += partial * level.price;
            amount += partial;
            break;
        }

        cost += level.value();
        amount += level.amount;
    }

    if amount == 0.0 || !amount.is_finite() {
        return Err(LiquidityError {
            side,
            target_notional,
        });
    }

    Ok(VwapResult {
        avg_price: cost / amount,
        filled_amount: amount,
        filled_notional: cost,
    })
}
