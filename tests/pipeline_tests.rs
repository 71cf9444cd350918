//! Pipeline integration tests
//!
//! Drive the real reader loop, evaluator, dedup gate and pipeline against
//! in-memory transports and hand-written fakes.

use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;

use spreadbot::alerts::AlertSink;
use spreadbot::error::{FeedError, OracleError, RestError};
use spreadbot::mexc::{pump_ticks, DepthSource};
use spreadbot::oracle::{PriceOracle, QuoteCache, QuoteCacheConfig};
use spreadbot::registry::TokenRegistry;
use spreadbot::spread::{DedupConfig, DedupGate, SpreadEvaluator};
use spreadbot::types::{BookLevel, DepthSnapshot, SpreadAlert, Tick};
use spreadbot::{Pipeline, PipelineStats};

/// Serves the same ask book for every symbol and records who asked
#[derive(Default)]
struct BookServer {
    requests: Mutex<Vec<String>>,
    latency: Duration,
}

#[async_trait]
impl DepthSource for BookServer {
    async fn fetch_depth(&self, symbol: &str, _limit: usize) -> Result<DepthSnapshot, RestError> {
        self.requests.lock().push(symbol.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(DepthSnapshot {
            symbol: symbol.to_string(),
            asks: vec![BookLevel::new(100.0, 20.0)],
            bids: vec![BookLevel::new(99.0, 20.0)],
        })
    }
}

struct FixedOracle(f64);

#[async_trait]
impl PriceOracle for FixedOracle {
    async fn request_price(&self, _token: &str) -> Result<f64, OracleError> {
        Ok(self.0)
    }
}

struct ChannelSink(mpsc::UnboundedSender<SpreadAlert>);

#[async_trait]
impl AlertSink for ChannelSink {
    async fn dispatch(&self, alert: &SpreadAlert) {
        let _ = self.0.send(alert.clone());
    }
}

/// Never finishes a delivery
struct StuckSink;

#[async_trait]
impl AlertSink for StuckSink {
    async fn dispatch(&self, _alert: &SpreadAlert) {
        std::future::pending::<()>().await;
    }
}

struct Harness {
    pipeline: Pipeline,
    depth: Arc<BookServer>,
    alerts: mpsc::UnboundedReceiver<SpreadAlert>,
}

fn harness(oracle_price: f64, threshold_pct: f64) -> Harness {
    harness_with_latency(oracle_price, threshold_pct, Duration::ZERO)
}

fn harness_with_latency(oracle_price: f64, threshold_pct: f64, latency: Duration) -> Harness {
    let depth = Arc::new(BookServer {
        requests: Mutex::new(Vec::new()),
        latency,
    });
    let quotes = QuoteCache::new(
        Arc::new(FixedOracle(oracle_price)),
        QuoteCacheConfig::default(),
        CancellationToken::new(),
    );
    let registry = TokenRegistry::from_pairs([
        ("BTC_USDT", "mint-btc"),
        ("DOGE_USDT", "mint-doge"),
        ("SOL_USDT", "mint-sol"),
    ]);
    let evaluator = SpreadEvaluator::new(
        depth.clone(),
        Arc::new(quotes),
        Arc::new(registry),
        20,
        1_000.0,
    );

    let (tx, alerts) = mpsc::unbounded_channel();
    let pipeline = Pipeline::new(
        evaluator,
        DedupGate::new(DedupConfig {
            price_epsilon: 1e-6,
            spread_epsilon: 0.1,
            cooldown: Duration::from_secs(300),
        }),
        Arc::new(ChannelSink(tx)),
        threshold_pct,
        Duration::from_secs(1),
    );

    Harness {
        pipeline,
        depth,
        alerts,
    }
}

fn tick(symbol: &str, ts: i64) -> Tick {
    Tick {
        symbol: symbol.to_string(),
        bid: 99.0,
        ask: 100.0,
        last_price: 99.5,
        volume_24h: 5_000_000.0,
        ts,
    }
}

fn ticker_frame(symbol: &str, volume: f64) -> Message {
    Message::Text(
        serde_json::json!({
            "channel": "push.ticker",
            "data": {
                "symbol": symbol,
                "lastPrice": 100.0,
                "bid1": 99.9,
                "ask1": 100.1,
                "volume24": volume
            },
            "ts": 1_700_000_000_000_i64
        })
        .to_string(),
    )
}

async fn next_alert(rx: &mut mpsc::UnboundedReceiver<SpreadAlert>) -> Option<SpreadAlert> {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn low_volume_ticks_never_reach_the_evaluator() {
    let frames: Vec<Result<Message, WsError>> = vec![
        Ok(ticker_frame("BTC_USDT", 5_000_000.0)),
        Ok(ticker_frame("DOGE_USDT", 500_000.0)),
    ];

    let (tx, rx) = mpsc::channel(16);
    let result = pump_ticks(
        stream::iter(frames),
        futures_util::sink::drain(),
        &tx,
        1_000_000.0,
        Duration::from_secs(30),
        &CancellationToken::new(),
    )
    .await;
    assert!(matches!(result, Err(FeedError::Stream(_))));
    drop(tx);

    let mut h = harness(90.0, 1.0);
    let stats = h
        .pipeline
        .run(ReceiverStream::new(rx), &CancellationToken::new())
        .await;

    assert_eq!(stats.ticks, 1);
    assert_eq!(*h.depth.requests.lock(), vec!["BTC_USDT".to_string()]);

    let alert = next_alert(&mut h.alerts).await.expect("alert");
    assert_eq!(alert.symbol, "BTC_USDT");
    assert_eq!(alert.vwap_ask, 100.0);
    assert_eq!(alert.oracle_price, 90.0);
    assert!((alert.spread_pct - 1_000.0 / 95.0).abs() < 1e-9);
}

#[tokio::test]
async fn spreads_below_threshold_are_not_alerted() {
    let mut h = harness(99.9, 1.0);

    let dispatched = h.pipeline.process(tick("SOL_USDT", 0)).await;

    assert!(!dispatched);
    assert_eq!(
        h.pipeline.stats(),
        PipelineStats {
            ticks: 1,
            evaluated: 1,
            alerts: 0,
            errors: 0,
        }
    );
    assert!(h.pipeline.gate().is_empty());
}

#[tokio::test]
async fn repeated_spread_is_suppressed_until_cooldown() {
    let mut h = harness(90.0, 1.0);

    let ticks = vec![
        tick("SOL_USDT", 0),
        tick("SOL_USDT", 5_000),
        tick("SOL_USDT", 299_999),
        tick("SOL_USDT", 300_000),
    ];
    let stats = h
        .pipeline
        .run(stream::iter(ticks), &CancellationToken::new())
        .await;

    assert_eq!(stats.ticks, 4);
    assert_eq!(stats.evaluated, 4);
    assert_eq!(stats.alerts, 2);

    let first = next_alert(&mut h.alerts).await.expect("first alert");
    let second = next_alert(&mut h.alerts).await.expect("second alert");
    assert_eq!(first.ts, 0);
    assert_eq!(second.ts, 300_000);
}

#[tokio::test]
async fn evaluation_errors_drop_only_that_tick() {
    let mut h = harness(90.0, 1.0);

    let ticks = vec![tick("PEPE_USDT", 0), tick("SOL_USDT", 0)];
    let stats = h
        .pipeline
        .run(stream::iter(ticks), &CancellationToken::new())
        .await;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.alerts, 1);
    assert_eq!(*h.depth.requests.lock(), vec!["SOL_USDT".to_string()]);
}

#[tokio::test]
async fn cancelled_pipeline_takes_no_more_ticks() {
    let mut h = harness(90.0, 1.0);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let stats = h
        .pipeline
        .run(stream::iter(vec![tick("SOL_USDT", 0)]), &shutdown)
        .await;

    assert_eq!(stats, PipelineStats::default());
    assert!(h.depth.requests.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_mid_tick_finishes_that_tick_first() {
    let mut h = harness_with_latency(90.0, 1.0, Duration::from_secs(2));
    let shutdown = CancellationToken::new();

    // fires while the first depth fetch is still in flight
    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let stats = h
        .pipeline
        .run(
            stream::iter(vec![tick("SOL_USDT", 0), tick("BTC_USDT", 0)]),
            &shutdown,
        )
        .await;

    assert_eq!(
        stats,
        PipelineStats {
            ticks: 1,
            evaluated: 1,
            alerts: 1,
            errors: 0,
        }
    );
    assert_eq!(*h.depth.requests.lock(), vec!["SOL_USDT".to_string()]);

    let alert = next_alert(&mut h.alerts).await.expect("in-flight alert");
    assert_eq!(alert.symbol, "SOL_USDT");
    assert!(h.alerts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stuck_sink_does_not_block_the_pipeline() {
    let depth = Arc::new(BookServer::default());
    let evaluator = SpreadEvaluator::new(
        depth.clone(),
        Arc::new(QuoteCache::new(
            Arc::new(FixedOracle(90.0)),
            QuoteCacheConfig::default(),
            CancellationToken::new(),
        )),
        Arc::new(TokenRegistry::from_pairs([
            ("SOL_USDT", "mint-sol"),
            ("BTC_USDT", "mint-btc"),
        ])),
        20,
        1_000.0,
    );
    let mut pipeline = Pipeline::new(
        evaluator,
        DedupGate::default(),
        Arc::new(StuckSink),
        1.0,
        Duration::from_millis(50),
    );

    let stats = pipeline
        .run(
            stream::iter(vec![tick("SOL_USDT", 0), tick("BTC_USDT", 0)]),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(stats.alerts, 2);
    assert_eq!(depth.requests.lock().len(), 2);
}
