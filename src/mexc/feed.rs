//! Ticker feed supervision
//!
//! Keeps a ticker connection alive across disconnects. The symbol set is
//! reloaded from the active symbol store on every (re)connect, so a daily
//! refresh takes effect the next time the socket is rebuilt.

use rand::Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::TickerStream;
use crate::error::FeedError;
use crate::registry::ActiveSymbolStore;
use crate::types::Tick;

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(60);
const RECONNECT_JITTER_RATIO: f64 = 0.20;

/// Linear backoff capped at 60s with up to 20% jitter either way
pub fn reconnect_delay(attempt: u32) -> Duration {
    let base = std::cmp::min(RECONNECT_BASE_DELAY * attempt.max(1), RECONNECT_MAX_DELAY);
    let jitter = rand::thread_rng().gen_range(-RECONNECT_JITTER_RATIO..=RECONNECT_JITTER_RATIO);
    base.mul_f64(1.0 + jitter)
}

pub struct FeedSupervisor {
    stream: TickerStream,
    store: Arc<dyn ActiveSymbolStore>,
    /// Consecutive failures tolerated before giving up (0 = never give up)
    max_reconnect_attempts: u32,
}

impl FeedSupervisor {
    pub fn new(
        stream: TickerStream,
        store: Arc<dyn ActiveSymbolStore>,
        max_reconnect_attempts: u32,
    ) -> Self {
        Self {
            stream,
            store,
            max_reconnect_attempts,
        }
    }

    async fn active_symbols(&self) -> BTreeSet<String> {
        match self.store.load().await {
            Ok(symbols) => symbols.into_keys().collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load active symbols");
                BTreeSet::new()
            }
        }
    }

    /// Connect, stream, reconnect. Returns `Ok(())` once cancelled or when
    /// the tick receiver goes away.
    pub async fn run(
        self,
        tx: mpsc::Sender<Tick>,
        shutdown: CancellationToken,
    ) -> Result<(), FeedError> {
        let mut attempt = 0u32;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let symbols = self.active_symbols().await;
            let outcome = match self.stream.connect(&symbols).await {
                Ok(connection) => {
                    attempt = 0;
                    connection.run(tx.clone(), shutdown.clone()).await
                }
                Err(e) => Err(e),
            };

            let err = match outcome {
                Ok(()) => {
                    info!("Ticker feed stopped");
                    return Ok(());
                }
                Err(e) => e,
            };

            attempt += 1;
            error!(error = %err, attempt = attempt, "Ticker feed failed");

            if self.max_reconnect_attempts > 0 && attempt >= self.max_reconnect_attempts {
                error!(
                    max_attempts = self.max_reconnect_attempts,
                    "Max reconnection attempts reached"
                );
                return Err(err);
            }

            let delay = reconnect_delay(attempt);
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = attempt,
                "🔄 Reconnecting ticker feed"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Ok(()),
            }
        }
    }
}

/// Spawn the supervisor and hand back the receiving end of its tick queue.
pub fn spawn_feed(
    supervisor: FeedSupervisor,
    capacity: usize,
    shutdown: CancellationToken,
) -> (mpsc::Receiver<Tick>, JoinHandle<Result<(), FeedError>>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(supervisor.run(tx, shutdown));
    (rx, handle)
}
