//! Symbol registry
//!
//! - `TokenRegistry`: static futures symbol → oracle token id map, loaded
//!   from a JSON file
//! - `ActiveSymbolStore`: key-value store holding the currently tradable set
//! - `SymbolRefresher`: rebuilds that set from 24h volume, once at startup and
//!   then daily

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::mexc::ContractTickerSource;

/// Symbol → oracle token id
pub type SymbolMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Deserialize)]
struct TokenEntry {
    mint: String,
}

/// Static mapping from futures symbol to oracle token id
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, String>,
}

impl TokenRegistry {
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            bail!("Token map is empty");
        }

        let raw: HashMap<String, TokenEntry> =
            serde_json::from_str(json).context("Failed to parse token map")?;
        let tokens: HashMap<String, String> = raw
            .into_iter()
            .filter(|(_, entry)| !entry.mint.trim().is_empty())
            .map(|(symbol, entry)| (symbol, entry.mint))
            .collect();

        if tokens.is_empty() {
            bail!("Token map has no usable entries");
        }
        Ok(Self { tokens })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read token map {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            tokens: pairs
                .into_iter()
                .map(|(s, t)| (s.into(), t.into()))
                .collect(),
        }
    }

    pub fn token_for(&self, symbol: &str) -> Option<&str> {
        self.tokens.get(symbol).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Persistent home of the tradable symbol set
#[async_trait]
pub trait ActiveSymbolStore: Send + Sync {
    async fn load(&self) -> Result<SymbolMap>;

    /// Replace the whole set in one step
    async fn replace(&self, symbols: SymbolMap) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemorySymbolStore {
    symbols: RwLock<SymbolMap>,
}

impl InMemorySymbolStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActiveSymbolStore for InMemorySymbolStore {
    async fn load(&self) -> Result<SymbolMap> {
        Ok(self.symbols.read().clone())
    }

    async fn replace(&self, symbols: SymbolMap) -> Result<()> {
        *self.symbols.write() = symbols;
        Ok(())
    }
}

/// Rebuilds the active symbol set from 24h contract volume
pub struct SymbolRefresher {
    tickers: Arc<dyn ContractTickerSource>,
    registry: Arc<TokenRegistry>,
    store: Arc<dyn ActiveSymbolStore>,
    min_volume_24h: f64,
}

impl SymbolRefresher {
    pub fn new(
        tickers: Arc<dyn ContractTickerSource>,
        registry: Arc<TokenRegistry>,
        store: Arc<dyn ActiveSymbolStore>,
        min_volume_24h: f64,
    ) -> Self {
        Self {
            tickers,
            registry,
            store,
            min_volume_24h,
        }
    }

    /// Fetch tickers, keep mapped symbols above the volume floor and store
    /// them. An empty result leaves the previous set in place.
    pub async fn refresh(&self) -> Result<usize> {
        let tickers = self
            .tickers
            .fetch_contract_tickers()
            .await
            .context("Failed to fetch contract tickers")?;

        let active: SymbolMap = tickers
            .into_iter()
            .filter(|t| t.volume_24h >= self.min_volume_24h)
            .filter_map(|t| {
                self.registry
                    .token_for(&t.symbol)
                    .map(|token| (t.symbol.clone(), token.to_string()))
            })
            .collect();

        if active.is_empty() {
            warn!(
                min_volume = self.min_volume_24h,
                "No contracts passed the volume filter, keeping previous symbol set"
            );
            return Ok(0);
        }

        let count = active.len();
        self.store
            .replace(active)
            .await
            .context("Failed to store active symbols")?;
        info!(count = count, "Active symbol set refreshed");
        Ok(count)
    }

    /// Run `refresh` every day at `hour_utc:00` until cancelled.
    pub fn spawn_daily(self: Arc<Self>, hour_utc: u32, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let wait = until_next_run(Utc::now(), hour_utc);
                info!(wait_secs = wait.as_secs(), hour_utc = hour_utc, "Next symbol refresh scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.cancelled() => {
                        info!("Symbol refresh job stopped");
                        return;
                    }
                }

                if let Err(e) = self.refresh().await {
                    error!(error = %e, "Symbol refresh failed");
                }
            }
        })
    }
}

/// Time until the next `hour_utc:00:00` strictly after `now`
pub fn until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let Some(today) = now.date_naive().and_hms_opt(hour_utc.min(23), 0, 0) else {
        return Duration::from_secs(24 * 60 * 60);
    };

    let mut next = today.and_utc();
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RestError;
    use crate::mexc::ContractTicker;
    use chrono::TimeZone;

    struct FixedTickers(Vec<ContractTicker>);

    #[async_trait]
    impl ContractTickerSource for FixedTickers {
        async fn fetch_contract_tickers(&self) -> Result<Vec<ContractTicker>, RestError> {
            Ok(self.0.clone())
        }
    }

    fn ticker(symbol: &str, volume: f64) -> ContractTicker {
        ContractTicker {
            symbol: symbol.to_string(),
            last_price: 1.0,
            volume_24h: volume,
        }
    }

    #[test]
    fn registry_loads_mint_map_and_ignores_extra_fields() {
        let json = r#"{
            "SOL_USDT": { "mint": "So11111111111111111111111111111111111111112", "decimals": "9" },
            "JUP_USDT": { "mint": "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN" },
            "BAD_USDT": { "mint": "  " }
        }"#;

        let registry = TokenRegistry::from_json(json).expect("registry");
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.token_for("SOL_USDT"),
            Some("So11111111111111111111111111111111111111112")
        );
        assert!(registry.token_for("BAD_USDT").is_none());
    }

    #[test]
    fn empty_registry_is_rejected() {
        assert!(TokenRegistry::from_json("").is_err());
        assert!(TokenRegistry::from_json("{}").is_err());
    }

    #[tokio::test]
    async fn refresh_keeps_mapped_liquid_symbols() {
        let registry = Arc::new(TokenRegistry::from_pairs([
            ("SOL_USDT", "mint-sol"),
            ("JUP_USDT", "mint-jup"),
        ]));
        let store = Arc::new(InMemorySymbolStore::new());
        let refresher = SymbolRefresher::new(
            Arc::new(FixedTickers(vec![
                ticker("SOL_USDT", 5_000_000.0),
                ticker("JUP_USDT", 500_000.0),
                ticker("BTC_USDT", 9_000_000.0),
            ])),
            registry,
            store.clone(),
            1_000_000.0,
        );

        assert_eq!(refresher.refresh().await.unwrap(), 1);
        let active = store.load().await.unwrap();
        assert_eq!(active.get("SOL_USDT").map(String::as_str), Some("mint-sol"));
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn empty_refresh_keeps_previous_set() {
        let store = Arc::new(InMemorySymbolStore::new());
        tokio_test::assert_ok!(
            store
                .replace(SymbolMap::from([("SOL_USDT".to_string(), "mint-sol".to_string())]))
                .await
        );

        let refresher = SymbolRefresher::new(
            Arc::new(FixedTickers(vec![ticker("SOL_USDT", 10.0)])),
            Arc::new(TokenRegistry::from_pairs([("SOL_USDT", "mint-sol")])),
            store.clone(),
            1_000_000.0,
        );

        assert_eq!(refresher.refresh().await.unwrap(), 0);
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[test]
    fn next_run_rolls_over_to_tomorrow() {
        let before = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
        assert_eq!(until_next_run(before, 3), Duration::from_secs(90 * 60));

        let after = Utc.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap();
        assert_eq!(until_next_run(after, 3), Duration::from_secs(24 * 60 * 60));
    }
}
