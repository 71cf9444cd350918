//! Configuration management for SpreadBot
//!
//! Loads from optional TOML/YAML/JSON files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

const ENV_PREFIX: &str = "SPREADBOT";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub oracle: OracleConfig,
    pub spread: SpreadConfig,
    pub alerts: AlertsConfig,
    pub registry: RegistryConfig,
}

fn with_defaults<St: config::builder::BuilderState>(
    builder: ConfigBuilder<St>,
) -> Result<ConfigBuilder<St>> {
    Ok(builder
        // Feed defaults
        .set_default("feed.ws_url", "wss://contract.mexc.com/edge")?
        .set_default("feed.rest_url", "https://contract.mexc.com")?
        .set_default("feed.min_volume_24h", 1_000_000.0)?
        .set_default("feed.heartbeat_secs", 30)?
        .set_default("feed.depth_limit", 20)?
        .set_default("feed.channel_capacity", 1024)?
        .set_default("feed.max_reconnect_attempts", 0)?
        .set_default("feed.rest_timeout_ms", 5000)?
        // Oracle defaults
        .set_default("oracle.price_url", "https://lite-api.jup.ag/price/v2")?
        .set_default(
            "oracle.vs_token",
            "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB",
        )?
        .set_default("oracle.cache_ttl_secs", 10)?
        .set_default("oracle.min_interval_ms", 1000)?
        .set_default("oracle.max_attempts", 5)?
        .set_default("oracle.request_timeout_ms", 5000)?
        // Spread defaults
        .set_default("spread.vwap_notional_usd", 1000.0)?
        .set_default("spread.threshold_pct", 1.0)?
        .set_default("spread.price_epsilon", 1e-6)?
        .set_default("spread.spread_epsilon", 0.1)?
        .set_default("spread.cooldown_secs", 300)?
        // Alert defaults
        .set_default("alerts.telegram_bot_token", "")?
        .set_default("alerts.telegram_chat_ids", Vec::<i64>::new())?
        .set_default("alerts.dispatch_timeout_ms", 10_000)?
        // Registry defaults
        .set_default("registry.token_map_path", "spl.json")?
        .set_default("registry.refresh_hour_utc", 3)?)
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (SPREADBOT_*)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("alerts.telegram_chat_ids")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Built-in defaults only, no files or environment
    pub fn defaults() -> Result<Self> {
        with_defaults(Config::builder())?
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.feed.ws_url.trim().is_empty() {
            bail!("feed.ws_url is empty");
        }
        if self.feed.rest_url.trim().is_empty() {
            bail!("feed.rest_url is empty");
        }
        if self.oracle.price_url.trim().is_empty() {
            bail!("oracle.price_url is empty");
        }
        if self.oracle.vs_token.trim().is_empty() {
            bail!("oracle.vs_token is empty");
        }
        if self.spread.vwap_notional_usd.is_nan() || self.spread.vwap_notional_usd <= 0.0 {
            bail!(
                "spread.vwap_notional_usd must be positive, got {}",
                self.spread.vwap_notional_usd
            );
        }
        if self.oracle.cache_ttl_secs == 0 {
            bail!("oracle.cache_ttl_secs must be positive");
        }
        if self.oracle.max_attempts == 0 {
            bail!("oracle.max_attempts must be at least 1");
        }
        if self.feed.heartbeat_secs == 0 {
            bail!("feed.heartbeat_secs must be positive");
        }
        if self.registry.refresh_hour_utc > 23 {
            bail!(
                "registry.refresh_hour_utc must be 0-23, got {}",
                self.registry.refresh_hour_utc
            );
        }
        Ok(())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "min_vol={:.0} notional={:.0} threshold={:.2}% ttl={}s throttle={}ms cooldown={}s telegram={}",
            self.feed.min_volume_24h,
            self.spread.vwap_notional_usd,
            self.spread.threshold_pct,
            self.oracle.cache_ttl_secs,
            self.oracle.min_interval_ms,
            self.spread.cooldown_secs,
            self.alerts.telegram_enabled()
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
