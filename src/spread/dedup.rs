//! Dedup/cooldown gate for spread alerts
//!
//! Remembers the last reported (price, spread, time) per symbol and
//! suppresses repeats of materially the same condition.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Price moves smaller than this count as unchanged
    pub price_epsilon: f64,
    /// Spread moves (percentage points) smaller than this count as unchanged
    pub spread_epsilon: f64,
    /// Minimum time between two reports of an unchanged condition
    pub cooldown: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            price_epsilon: 1e-6,
            spread_epsilon: 0.1,
            cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupState {
    pub price: f64,
    pub spread: f64,
    /// Unix ms of the last report
    pub logged_at: i64,
}

#[derive(Debug, Default)]
pub struct DedupGate {
    config: DedupConfig,
    last: HashMap<String, DedupState>,
}

impl DedupGate {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            last: HashMap::new(),
        }
    }

    /// Decide whether this observation should be reported.
    ///
    /// Suppresses only when price, spread AND elapsed time are all inside
    /// their windows. A reported observation replaces the stored state.
    pub fn should_report(&mut self, symbol: &str, price: f64, spread: f64, now_ms: i64) -> bool {
        if let Some(last) = self.last.get(symbol) {
            let cooldown_ms = self.config.cooldown.as_millis() as i64;
            let unchanged_price = (price - last.price).abs() < self.config.price_epsilon;
            let unchanged_spread = (spread - last.spread).abs() < self.config.spread_epsilon;
            let cooling = now_ms.saturating_sub(last.logged_at) < cooldown_ms;

            if unchanged_price && unchanged_spread && cooling {
                tracing::trace!(symbol = %symbol, spread = spread, "Alert suppressed by cooldown");
                return false;
            }
        }

        self.last.insert(
            symbol.to_string(),
            DedupState {
                price,
                spread,
                logged_at: now_ms,
            },
        );
        true
    }

    pub fn state(&self, symbol: &str) -> Option<&DedupState> {
        self.last.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
