//! Configuration section types

use serde::Deserialize;
use std::time::Duration;

use crate::oracle::QuoteCacheConfig;
use crate::spread::DedupConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Contract WebSocket endpoint
    pub ws_url: String,
    /// Contract REST base URL
    pub rest_url: String,
    /// Ticks and refresh candidates below this 24h volume are dropped
    pub min_volume_24h: f64,
    /// Heartbeat ping interval in seconds
    pub heartbeat_secs: u64,
    /// Depth levels requested per snapshot
    pub depth_limit: usize,
    /// Tick queue capacity between reader and pipeline
    pub channel_capacity: usize,
    /// Consecutive reconnect failures before giving up (0 = unlimited)
    pub max_reconnect_attempts: u32,
    pub rest_timeout_ms: u64,
}

impl FeedConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_millis(self.rest_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Jupiter price endpoint
    pub price_url: String,
    /// Quote token prices are expressed in (USDT mint)
    pub vs_token: String,
    pub cache_ttl_secs: u64,
    /// Minimum gap between oracle requests in milliseconds
    pub min_interval_ms: u64,
    /// Attempts per lookup while rate limited
    pub max_attempts: u32,
    pub request_timeout_ms: u64,
}

impl OracleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_config(&self) -> QuoteCacheConfig {
        QuoteCacheConfig {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpreadConfig {
    /// Target notional for the ask-side VWAP, in USD
    pub vwap_notional_usd: f64,
    /// Minimum spread (percent) worth alerting on
    pub threshold_pct: f64,
    pub price_epsilon: f64,
    /// Spread change (percentage points) that counts as new
    pub spread_epsilon: f64,
    pub cooldown_secs: u64,
}

impl SpreadConfig {
    pub fn dedup_config(&self) -> DedupConfig {
        DedupConfig {
            price_epsilon: self.price_epsilon,
            spread_epsilon: self.spread_epsilon,
            cooldown: Duration::from_secs(self.cooldown_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    /// Empty disables Telegram and alerts are only logged
    #[serde(default)]
    pub telegram_bot_token: String,
    #[serde(default)]
    pub telegram_chat_ids: Vec<i64>,
    pub dispatch_timeout_ms: u64,
}

impl AlertsConfig {
    pub fn telegram_enabled(&self) -> bool {
        !self.telegram_bot_token.trim().is_empty() && !self.telegram_chat_ids.is_empty()
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// JSON file mapping futures symbol to `{ "mint": ... }`
    pub token_map_path: String,
    /// Hour (UTC) of the daily active-symbol refresh
    pub refresh_hour_utc: u32,
}
