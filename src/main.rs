//! SpreadBot - Entry Point
//!
//! Streams MEXC futures tickers, prices each tick against Jupiter and
//! alerts on wide, novel spreads.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spreadbot::alerts::{AlertSink, LogSink, TelegramNotifier};
use spreadbot::mexc::{spawn_feed, FeedSupervisor, MexcRestClient, TickerStream};
use spreadbot::oracle::{JupiterClient, QuoteCache};
use spreadbot::registry::{InMemorySymbolStore, SymbolRefresher, TokenRegistry};
use spreadbot::spread::{DedupGate, SpreadEvaluator};
use spreadbot::{AppConfig, Pipeline};

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("SPREADBOT_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting SpreadBot v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!(config = %config, "Configuration loaded");

    let registry = Arc::new(
        TokenRegistry::load(&config.registry.token_map_path).context("Failed to load token map")?,
    );
    info!(tokens = registry.len(), path = %config.registry.token_map_path, "Token registry loaded");

    let shutdown = CancellationToken::new();

    let rest = Arc::new(MexcRestClient::new(
        &config.feed.rest_url,
        config.feed.rest_timeout(),
    )?);
    let jupiter = Arc::new(JupiterClient::new(
        &config.oracle.price_url,
        &config.oracle.vs_token,
        config.oracle.request_timeout(),
    )?);
    let quotes = Arc::new(QuoteCache::new(
        jupiter,
        config.oracle.cache_config(),
        shutdown.clone(),
    ));

    // Active symbols: one refresh now, then daily
    let store = Arc::new(InMemorySymbolStore::new());
    let refresher = Arc::new(SymbolRefresher::new(
        rest.clone(),
        registry.clone(),
        store.clone(),
        config.feed.min_volume_24h,
    ));
    let active = refresher
        .refresh()
        .await
        .context("Initial symbol refresh failed")?;
    if active == 0 {
        anyhow::bail!("No symbols passed the volume filter, nothing to watch");
    }
    let refresh_job = refresher.spawn_daily(config.registry.refresh_hour_utc, shutdown.clone());

    let sink: Arc<dyn AlertSink> = if config.alerts.telegram_enabled() {
        info!(chats = config.alerts.telegram_chat_ids.len(), "Telegram alerts enabled");
        Arc::new(TelegramNotifier::new(
            &config.alerts.telegram_bot_token,
            config.alerts.telegram_chat_ids.clone(),
            config.alerts.dispatch_timeout(),
        )?)
    } else {
        warn!("Telegram not configured, alerts will only be logged");
        Arc::new(LogSink)
    };

    let supervisor = FeedSupervisor::new(
        TickerStream::new(
            &config.feed.ws_url,
            config.feed.min_volume_24h,
            config.feed.heartbeat(),
        ),
        store,
        config.feed.max_reconnect_attempts,
    );
    let (ticks, feed) = spawn_feed(supervisor, config.feed.channel_capacity, shutdown.clone());

    let evaluator = SpreadEvaluator::new(
        rest,
        quotes,
        registry,
        config.feed.depth_limit,
        config.spread.vwap_notional_usd,
    );
    let mut pipeline = Pipeline::new(
        evaluator,
        DedupGate::new(config.spread.dedup_config()),
        sink,
        config.spread.threshold_pct,
        config.alerts.dispatch_timeout(),
    );

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
        ctrl_c.cancel();
    });

    let stats = pipeline.run(ReceiverStream::new(ticks), &shutdown).await;

    // stream ended on its own: make sure the feed and refresh job stop too
    shutdown.cancel();
    match feed.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Ticker feed gave up"),
        Err(e) => error!(error = %e, "Ticker feed task panicked"),
    }
    let _ = refresh_job.await;

    info!(stats = %stats, "👋 SpreadBot stopped");
    Ok(())
}
