//! MEXC contract WebSocket ticker stream
//!
//! Subscribes `sub.ticker` per symbol, keeps the socket alive with a
//! `ping` every heartbeat interval and turns `push.ticker` frames into
//! [`Tick`]s. Frames may arrive gzip-compressed; the format is sniffed from
//! the first two bytes because the feed sends no content type.

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::FeedError;
use crate::types::Tick;

const TICKER_CHANNEL: &str = "push.ticker";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
/// Upper bound on an inflated frame
const MAX_FRAME_BYTES: u64 = 1 << 20;

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    method: &'static str,
    param: SubscribeParam<'a>,
    id: u64,
}

#[derive(Debug, Serialize)]
struct SubscribeParam<'a> {
    symbol: &'a str,
}

#[derive(Debug, Deserialize)]
struct PushFrame {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerData {
    symbol: String,
    #[serde(default)]
    last_price: f64,
    #[serde(default)]
    bid1: f64,
    #[serde(default)]
    ask1: f64,
    #[serde(default)]
    volume24: f64,
}

fn heartbeat_message() -> Message {
    Message::Text(r#"{"method":"ping"}"#.to_string())
}

/// True when the frame starts with the gzip signature
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == GZIP_MAGIC
}

/// Decode one raw frame.
///
/// Returns `Ok(None)` for anything that is not a ticker push (acks, pongs,
/// other channels).
pub fn decode_frame(bytes: &[u8], received_at: i64) -> Result<Option<Tick>> {
    let inflated;
    let payload = if is_gzip(bytes) {
        let mut buf = Vec::with_capacity(bytes.len() * 4);
        GzDecoder::new(bytes)
            .take(MAX_FRAME_BYTES + 1)
            .read_to_end(&mut buf)
            .context("Failed to inflate gzip frame")?;
        if buf.len() as u64 > MAX_FRAME_BYTES {
            bail!("Inflated frame exceeds {} bytes", MAX_FRAME_BYTES);
        }
        inflated = buf;
        inflated.as_slice()
    } else {
        bytes
    };

    let frame: PushFrame = serde_json::from_slice(payload).context("Frame is not valid JSON")?;
    if frame.channel != TICKER_CHANNEL {
        return Ok(None);
    }

    let data = frame.data.context("Ticker push without data")?;
    let ticker: TickerData =
        serde_json::from_value(data).context("Malformed ticker payload")?;

    Ok(Some(Tick {
        symbol: ticker.symbol,
        bid: ticker.bid1,
        ask: ticker.ask1,
        last_price: ticker.last_price,
        volume_24h: ticker.volume24,
        ts: received_at,
    }))
}

/// Send one `sub.ticker` request per symbol, each with its own id.
///
/// Any failed write fails the whole subscription.
pub async fn subscribe_symbols<'a, W, I>(write: &mut W, symbols: I) -> Result<usize, FeedError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
    I: IntoIterator<Item = &'a str>,
{
    let base_id = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default()
        .unsigned_abs();

    let mut sent = 0usize;
    for (idx, symbol) in symbols.into_iter().enumerate() {
        let request = SubscribeRequest {
            method: "sub.ticker",
            param: SubscribeParam { symbol },
            id: base_id.wrapping_add(idx as u64),
        };
        let text = serde_json::to_string(&request)
            .map_err(|e| FeedError::Connection(format!("encode subscription: {}", e)))?;

        write
            .send(Message::Text(text))
            .await
            .map_err(|e| FeedError::Connection(format!("subscribe {} failed: {}", symbol, e)))?;
        sent += 1;
    }

    Ok(sent)
}

/// Read loop shared by the live connection and tests.
///
/// A decoded tick is held until the queue has room; while it waits the
/// socket is not read, but heartbeats and cancellation are still served.
/// Returns `Ok(())` on cancellation or when the tick receiver is gone, and
/// `FeedError::Stream` when the transport fails or closes.
pub async fn pump_ticks<R, W, E>(
    mut read: R,
    mut write: W,
    tx: &mpsc::Sender<Tick>,
    min_volume_24h: f64,
    heartbeat: Duration,
    shutdown: &CancellationToken,
) -> Result<(), FeedError>
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let mut heartbeat_interval = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    heartbeat_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending: Option<Tick> = None;

    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Ticker stream shutdown requested");
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(error = %e, "Failed to send close frame");
                }
                return Ok(());
            }
            _ = heartbeat_interval.tick() => {
                write
                    .send(heartbeat_message())
                    .await
                    .map_err(|e| FeedError::Stream(format!("heartbeat failed: {}", e)))?;
                trace!("Heartbeat sent");
                continue;
            }
            permit = tx.reserve(), if pending.is_some() => {
                let Ok(permit) = permit else {
                    info!("Tick receiver dropped, stopping stream");
                    return Ok(());
                };
                if let Some(tick) = pending.take() {
                    permit.send(tick);
                }
                continue;
            }
            msg = read.next(), if pending.is_none() => msg,
        };

        let bytes = match frame {
            Some(Ok(Message::Text(text))) => text.into_bytes(),
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Ping(data))) => {
                if let Err(e) = write.send(Message::Pong(data)).await {
                    debug!(error = %e, "Failed to answer ping");
                }
                continue;
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(FeedError::Stream(format!("closed by server: {:?}", frame)));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(FeedError::Stream(e.to_string())),
            None => return Err(FeedError::Stream("stream ended".to_string())),
        };

        let tick = match decode_frame(&bytes, chrono::Utc::now().timestamp_millis()) {
            Ok(Some(tick)) => tick,
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Skipping undecodable frame");
                continue;
            }
        };

        if tick.volume_24h < min_volume_24h {
            trace!(symbol = %tick.symbol, volume = tick.volume_24h, "Tick below volume floor");
            continue;
        }

        pending = Some(tick);
    }
}

/// Factory for ticker connections
#[derive(Debug, Clone)]
pub struct TickerStream {
    url: String,
    min_volume_24h: f64,
    heartbeat: Duration,
}

impl TickerStream {
    pub fn new(url: &str, min_volume_24h: f64, heartbeat: Duration) -> Self {
        Self {
            url: url.to_string(),
            min_volume_24h,
            heartbeat,
        }
    }

    /// Dial the feed and subscribe every symbol.
    pub async fn connect(&self, symbols: &BTreeSet<String>) -> Result<TickerConnection, FeedError> {
        if symbols.is_empty() {
            return Err(FeedError::Connection("no symbols to subscribe".to_string()));
        }

        info!(url = %self.url, symbols = symbols.len(), "Connecting to MEXC ticker stream...");

        let (mut socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| FeedError::Connection(e.to_string()))?;

        let subscribed = subscribe_symbols(&mut socket, symbols.iter().map(String::as_str)).await?;
        info!(subscribed = subscribed, "✅ Subscribed to MEXC tickers");

        Ok(TickerConnection {
            socket,
            min_volume_24h: self.min_volume_24h,
            heartbeat: self.heartbeat,
        })
    }
}

/// A live, fully subscribed connection
pub struct TickerConnection {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    min_volume_24h: f64,
    heartbeat: Duration,
}

impl TickerConnection {
    /// Pump ticks into `tx` until cancellation or a fatal stream error.
    pub async fn run(
        self,
        tx: mpsc::Sender<Tick>,
        shutdown: CancellationToken,
    ) -> Result<(), FeedError> {
        let (write, read) = self.socket.split();
        pump_ticks(
            read,
            write,
            &tx,
            self.min_volume_24h,
            self.heartbeat,
            &shutdown,
        )
        .await
    }
}
