//! Pipeline Driver
//!
//! Single consumer loop: evaluate → threshold → dedup → dispatch, one tick at
//! a time. Dispatch runs in its own task so a slow notifier never holds up
//! the next tick.

use futures_util::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::alerts::AlertSink;
use crate::spread::{DedupGate, SpreadEvaluator};
use crate::types::{SpreadAlert, Tick};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Ticks pulled off the stream
    pub ticks: u64,
    /// Ticks that produced a spread
    pub evaluated: u64,
    /// Alerts handed to the sink
    pub alerts: u64,
    /// Ticks dropped on an evaluation error
    pub errors: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} evaluated={} alerts={} errors={}",
            self.ticks, self.evaluated, self.alerts, self.errors
        )
    }
}

pub struct Pipeline {
    evaluator: SpreadEvaluator,
    gate: DedupGate,
    sink: Arc<dyn AlertSink>,
    threshold_pct: f64,
    dispatch_timeout: Duration,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        evaluator: SpreadEvaluator,
        gate: DedupGate,
        sink: Arc<dyn AlertSink>,
        threshold_pct: f64,
        dispatch_timeout: Duration,
    ) -> Self {
        Self {
            evaluator,
            gate,
            sink,
            threshold_pct,
            dispatch_timeout,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn gate(&self) -> &DedupGate {
        &self.gate
    }

    /// Consume `ticks` until the stream ends or `shutdown` fires. A tick
    /// already being processed is always finished first.
    pub async fn run<S>(&mut self, mut ticks: S, shutdown: &CancellationToken) -> PipelineStats
    where
        S: Stream<Item = Tick> + Unpin,
    {
        info!(threshold_pct = self.threshold_pct, "🚀 Spread pipeline started");

        loop {
            let tick = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Pipeline shutdown requested");
                    break;
                }
                next = ticks.next() => match next {
                    Some(tick) => tick,
                    None => {
                        info!("Tick stream ended");
                        break;
                    }
                },
            };

            self.process(tick).await;
        }

        info!(stats = %self.stats, "Spread pipeline stopped");
        self.stats
    }

    /// Run one tick through the whole chain. Returns whether an alert was
    /// dispatched.
    pub async fn process(&mut self, tick: Tick) -> bool {
        self.stats.ticks += 1;

        let event = match self.evaluator.evaluate(&tick).await {
            Ok(event) => event,
            Err(e) => {
                self.stats.errors += 1;
                warn!(symbol = %tick.symbol, stage = e.stage(), error = %e, "Tick dropped");
                return false;
            }
        };
        self.stats.evaluated += 1;

        if event.spread_pct < self.threshold_pct {
            debug!(
                symbol = %event.symbol,
                spread_pct = event.spread_pct,
                "Spread below threshold"
            );
            return false;
        }

        if !self
            .gate
            .should_report(&event.symbol, event.vwap_ask, event.spread_pct, event.ts)
        {
            debug!(symbol = %event.symbol, spread_pct = event.spread_pct, "Alert suppressed");
            return false;
        }

        self.stats.alerts += 1;
        self.dispatch(SpreadAlert::from(&event));
        true
    }

    fn dispatch(&self, alert: SpreadAlert) {
        let sink = Arc::clone(&self.sink);
        let timeout = self.dispatch_timeout;

        tokio::spawn(async move {
            if tokio::time::timeout(timeout, sink.dispatch(&alert)).await.is_err() {
                warn!(
                    symbol = %alert.symbol,
                    timeout_ms = timeout.as_millis() as u64,
                    "Alert dispatch timed out"
                );
            }
        });
    }
}
