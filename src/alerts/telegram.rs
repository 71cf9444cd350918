//! Telegram Bot API notifier
//!
//! One `sendMessage` per chat id, HTML parse mode.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::AlertSink;
use crate::types::SpreadAlert;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render an alert as a Telegram HTML message
pub fn format_message(alert: &SpreadAlert) -> String {
    format!(
        "<b>{}</b> spread <b>{:.2}%</b>\nMEXC VWAP ask: <code>{:.8}</code>\nJupiter: <code>{:.8}</code>\n24h volume: {:.0}",
        escape_html(&alert.symbol),
        alert.spread_pct,
        alert.vwap_ask,
        alert.oracle_price,
        alert.volume_24h,
    )
}

pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_ids: Vec<i64>,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_ids: Vec<i64>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(TELEGRAM_API, bot_token, chat_ids, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        bot_token: &str,
        chat_ids: Vec<i64>,
        timeout: Duration,
    ) -> Result<Self> {
        if bot_token.trim().is_empty() {
            bail!("Telegram bot token is empty");
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_ids,
        })
    }

    pub fn chat_ids(&self) -> &[i64] {
        &self.chat_ids
    }

    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let body = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Telegram request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("Telegram API returned {}: {}", status, detail);
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn dispatch(&self, alert: &SpreadAlert) {
        let text = format_message(alert);

        for &chat_id in &self.chat_ids {
            match self.send(chat_id, &text).await {
                Ok(()) => debug!(chat_id = chat_id, symbol = %alert.symbol, "Alert delivered"),
                Err(e) => warn!(chat_id = chat_id, symbol = %alert.symbol, error = %e, "Alert delivery failed"),
            }
        }
    }
}
