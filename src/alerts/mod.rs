//! Alert dispatch
//!
//! `AlertSink` is the outbound edge of the pipeline. Sinks never fail from
//! the caller's point of view; delivery problems are logged inside.

mod telegram;

pub use telegram::{format_message, TelegramNotifier};

use async_trait::async_trait;
use tracing::info;

use crate::types::SpreadAlert;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, alert: &SpreadAlert);
}

/// Logs alerts instead of pushing them anywhere
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn dispatch(&self, alert: &SpreadAlert) {
        info!(
            symbol = %alert.symbol,
            vwap_ask = alert.vwap_ask,
            oracle = alert.oracle_price,
            spread_pct = %format!("{:.2}", alert.spread_pct),
            volume_24h = alert.volume_24h,
            "🚨 Spread alert"
        );
    }
}
