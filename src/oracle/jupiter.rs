//! Jupiter price API client
//!
//! `GET {price_url}?ids={mint}&vsToken={vs}` returns a map of mint to a
//! string-encoded decimal price.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::PriceOracle;
use crate::error::OracleError;

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[serde(default)]
    data: HashMap<String, Option<PriceInfo>>,
}

#[derive(Debug, Deserialize)]
struct PriceInfo {
    #[serde(default)]
    price: Option<String>,
}

pub struct JupiterClient {
    client: Client,
    price_url: String,
    vs_token: String,
}

impl JupiterClient {
    pub fn new(price_url: &str, vs_token: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            price_url: price_url.trim_end_matches('/').to_string(),
            vs_token: vs_token.to_string(),
        })
    }
}

fn extract_price(body: &str, token: &str) -> Result<f64, OracleError> {
    let response: PriceResponse =
        serde_json::from_str(body).map_err(|_| OracleError::MissingPrice(token.to_string()))?;

    let raw = response
        .data
        .get(token)
        .and_then(|info| info.as_ref())
        .and_then(|info| info.price.clone())
        .ok_or_else(|| OracleError::MissingPrice(token.to_string()))?;

    match raw.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price > 0.0 => Ok(price),
        _ => Err(OracleError::InvalidPrice {
            token: token.to_string(),
            raw,
        }),
    }
}

#[async_trait]
impl PriceOracle for JupiterClient {
    async fn request_price(&self, token: &str) -> Result<f64, OracleError> {
        let response = self
            .client
            .get(&self.price_url)
            .query(&[("ids", token), ("vsToken", self.vs_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited);
        }
        if !status.is_success() {
            return Err(OracleError::Status(status));
        }

        let body = response.text().await?;
        extract_price(&body, token)
    }
}
