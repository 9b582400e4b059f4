use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::foreground::PageSignal;
use crate::models::ElementId;
use crate::scan::ContentNode;

use super::engine::{DwellEngine, EngineMsg, EngineStats};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Runs a `DwellEngine` on tokio.
///
/// The engine lives inside one consumer task fed by an unbounded channel, so
/// dispatch is strictly serial and senders never wait. A separate ticker task
/// only enqueues `Tick`. On shutdown the ticker is cancelled and joined before
/// `Teardown` is enqueued, and the consumer exits right after handling it.
pub struct DwellController {
    tx: mpsc::UnboundedSender<EngineMsg>,
    worker: Option<JoinHandle<EngineStats>>,
    ticker: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
    session_id: String,
}

impl DwellController {
    pub fn start(engine: DwellEngine, tick_interval: Duration) -> Self {
        let session_id = engine.session_id().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let worker = tokio::spawn(engine_loop(engine, rx));
        let ticker = tokio::spawn(ticker_loop(tx.clone(), tick_interval, cancel_token.clone()));

        Self {
            tx,
            worker: Some(worker),
            ticker: Some(ticker),
            cancel_token,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn send(&self, msg: EngineMsg) -> Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| anyhow!("dwell engine is no longer running"))
    }

    pub fn rescan(&self, document_id: impl Into<String>, nodes: Vec<ContentNode>) -> Result<()> {
        self.send(EngineMsg::Rescan {
            document_id: document_id.into(),
            nodes,
        })
    }

    pub fn intersections(&self, ratios: Vec<(ElementId, f64)>) -> Result<()> {
        self.send(EngineMsg::Intersections(ratios))
    }

    pub fn page(&self, signal: PageSignal) -> Result<()> {
        self.send(EngineMsg::Page(signal))
    }

    /// Retire the ticker, flush every entry, and wait for the engine to stop.
    pub async fn shutdown(mut self) -> Result<EngineStats> {
        self.cancel_token.cancel();
        if let Some(ticker) = self.ticker.take() {
            ticker.await.context("ticker task failed to join")?;
        }

        // The consumer may already be gone if it panicked; join reports that.
        let _ = self.tx.send(EngineMsg::Teardown);

        let worker = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("dwell engine already shut down"))?;
        let stats = worker.await.context("dwell engine task failed to join")?;

        log_info!(
            "dwell session {} closed: {} flushes, {} queued, {} discarded, {} rejected",
            self.session_id,
            stats.flushes,
            stats.queued,
            stats.discarded,
            stats.rejected
        );
        Ok(stats)
    }
}

impl Drop for DwellController {
    fn drop(&mut self) {
        // Dropped without shutdown: stop ticking. The consumer tears the
        // engine down once every sender is gone.
        self.cancel_token.cancel();
    }
}

async fn engine_loop(
    mut engine: DwellEngine,
    mut rx: mpsc::UnboundedReceiver<EngineMsg>,
) -> EngineStats {
    while let Some(msg) = rx.recv().await {
        let teardown = matches!(msg, EngineMsg::Teardown);
        engine.dispatch(msg);
        if teardown {
            break;
        }
    }

    if !engine.is_torn_down() {
        log_warn!("dwell controller dropped without shutdown; flushing");
        engine.dispatch(EngineMsg::Teardown);
    }

    engine.stats()
}

async fn ticker_loop(
    tx: mpsc::UnboundedSender<EngineMsg>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut interval = time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; nothing to roll yet.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if tx.send(EngineMsg::Tick).is_err() {
                    log_debug!("ticker stopping (engine gone)");
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                log_debug!("ticker cancelled");
                break;
            }
        }
    }
}
