//! MEXC contract REST client
//!
//! Endpoints:
//! - `GET /api/v1/contract/depth/{symbol}?limit=N`
//! - `GET /api/v1/contract/ticker`

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ContractTickerSource, DepthSource};
use crate::error::RestError;
use crate::types::{BookLevel, DepthSnapshot};

#[derive(Debug, Deserialize)]
struct DepthResponse {
    data: DepthData,
}

#[derive(Debug, Default, Deserialize)]
struct DepthData {
    #[serde(default)]
    asks: Vec<Vec<f64>>,
    #[serde(default)]
    bids: Vec<Vec<f64>>,
}

/// 24h statistics for one contract
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTicker {
    pub symbol: String,
    #[serde(default)]
    pub last_price: f64,
    #[serde(rename = "volume24", default)]
    pub volume_24h: f64,
}

#[derive(Debug, Deserialize)]
struct TickerResponse {
    #[serde(default)]
    data: Vec<ContractTicker>,
}

/// Rows are `[price, amount, order_count]`; anything shorter is skipped.
fn parse_levels(rows: Vec<Vec<f64>>) -> Vec<BookLevel> {
    rows.into_iter()
        .filter_map(|row| match row.as_slice() {
            [price, amount, ..] => Some(BookLevel::new(*price, *amount)),
            _ => None,
        })
        .collect()
}

fn build_depth_snapshot(symbol: &str, body: &str) -> Result<DepthSnapshot, RestError> {
    let response: DepthResponse = serde_json::from_str(body)?;
    let mut snapshot = DepthSnapshot {
        symbol: symbol.to_string(),
        asks: parse_levels(response.data.asks),
        bids: parse_levels(response.data.bids),
    };
    snapshot.normalize_levels();
    Ok(snapshot)
}

/// REST client for MEXC contract market data
pub struct MexcRestClient {
    client: Client,
    base_url: String,
}

impl MexcRestClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, RestError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RestError::Status(response.status()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ContractTickerSource for MexcRestClient {
    async fn fetch_contract_tickers(&self) -> Result<Vec<ContractTicker>, RestError> {
        let url = format!("{}/api/v1/contract/ticker", self.base_url);
        let body = self.get_text(&url).await?;
        let response: TickerResponse = serde_json::from_str(&body)?;
        Ok(response.data)
    }
}

#[async_trait]
impl DepthSource for MexcRestClient {
    async fn fetch_depth(&self, symbol: &str, limit: usize) -> Result<DepthSnapshot, RestError> {
        let url = format!(
            "{}/api/v1/contract/depth/{}?limit={}",
            self.base_url,
            symbol,
            limit.max(1)
        );
        let body = self.get_text(&url).await?;
        let snapshot = build_depth_snapshot(symbol, &body)?;

        debug!(
            symbol = %symbol,
            asks = snapshot.asks.len(),
            bids = snapshot.bids.len(),
            "Depth snapshot fetched"
        );
        Ok(snapshot)
    }
}
