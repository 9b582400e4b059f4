use serde::Serialize;
use std::sync::Arc;

use crate::emitter::{Emitter, FlushOutcome, Transport};
use crate::foreground::{PageForegroundMonitor, PageSignal};
use crate::models::{ElementId, Session};
use crate::scan::{scan, ContentNode, Registration};
use crate::settings::DwellSettings;
use crate::visibility::VisibilitySource;

use super::{
    accumulator::{DwellAccumulator, Flush},
    clock::Clock,
    store::DwellStore,
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Every input the engine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMsg {
    /// The container's content changed; re-scan trackable nodes.
    Rescan {
        document_id: String,
        nodes: Vec<ContentNode>,
    },
    /// One evaluation pass of the viewport intersection primitive.
    Intersections(Vec<(ElementId, f64)>),
    Page(PageSignal),
    Tick,
    /// Unmount: flush everything and stop.
    Teardown,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub flushes: u64,
    pub queued: u64,
    pub discarded: u64,
    pub rejected: u64,
}

impl EngineStats {
    fn record(&mut self, outcome: FlushOutcome) {
        self.flushes += 1;
        match outcome {
            FlushOutcome::Queued => self.queued += 1,
            FlushOutcome::Discarded => self.discarded += 1,
            FlushOutcome::Rejected => self.rejected += 1,
        }
    }
}

/// Single dispatch point for visibility, page, tick, rescan and teardown
/// messages.
///
/// `dispatch` takes `&mut self` and reads the clock exactly once, so every
/// transition in a message is computed against one timestamp and no handler
/// can re-enter another.
pub struct DwellEngine {
    session: Session,
    clock: Box<dyn Clock>,
    visibility: VisibilitySource,
    foreground: PageForegroundMonitor,
    accumulator: DwellAccumulator,
    emitter: Emitter,
    stats: EngineStats,
}

impl DwellEngine {
    pub fn new(
        settings: &DwellSettings,
        transport: Arc<dyn Transport>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self::with_session(settings, transport, clock, Session::generate())
    }

    pub fn with_session(
        settings: &DwellSettings,
        transport: Arc<dyn Transport>,
        clock: Box<dyn Clock>,
        session: Session,
    ) -> Self {
        let emitter = Emitter::new(settings, session.id(), transport);
        log_info!(
            "dwell engine ready: session {} -> {}",
            session.id(),
            emitter.collect_url()
        );

        Self {
            session,
            clock,
            visibility: VisibilitySource::new(),
            foreground: PageForegroundMonitor::default(),
            accumulator: DwellAccumulator::new(true),
            emitter,
            stats: EngineStats::default(),
        }
    }

    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn store(&self) -> &DwellStore {
        self.accumulator.store()
    }

    pub fn visibility(&self) -> &VisibilitySource {
        &self.visibility
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn is_torn_down(&self) -> bool {
        self.accumulator.is_torn_down()
    }

    /// Apply one message and hand any resulting flushes to the emitter.
    /// Returns the flushes for inspection; delivery outcome is in `stats`.
    pub fn dispatch(&mut self, msg: EngineMsg) -> Vec<Flush> {
        let now = self.clock.now_ms();

        let flushes = match msg {
            EngineMsg::Rescan { document_id, nodes } => {
                self.rescan(&document_id, &nodes, now).1
            }
            EngineMsg::Intersections(ratios) => {
                if self.accumulator.is_torn_down() {
                    log_warn!("ignoring intersections after teardown");
                    return Vec::new();
                }
                let batch = self.visibility.evaluate(&ratios);
                self.accumulator.on_visibility(&batch, now)
            }
            EngineMsg::Page(signal) => match self.foreground.observe(signal) {
                Some(transition) => self.accumulator.on_page(transition, now),
                None => Vec::new(),
            },
            EngineMsg::Tick => {
                self.accumulator.on_tick(now);
                Vec::new()
            }
            EngineMsg::Teardown => {
                self.visibility.disconnect_all();
                let flushes = self.accumulator.teardown(now);
                if !flushes.is_empty() {
                    log_info!("teardown flushed {} entr(ies)", flushes.len());
                }
                flushes
            }
        };

        self.emit(&flushes);
        flushes
    }

    /// Re-scan the container. Returns the registrations (so the renderer can
    /// write assigned labels back) and the flushes for removed nodes.
    pub fn rescan_now(
        &mut self,
        document_id: &str,
        nodes: &[ContentNode],
    ) -> (Vec<Registration>, Vec<Flush>) {
        let now = self.clock.now_ms();
        let (registrations, flushes) = self.rescan(document_id, nodes, now);
        self.emit(&flushes);
        (registrations, flushes)
    }

    fn rescan(
        &mut self,
        document_id: &str,
        nodes: &[ContentNode],
        now: u64,
    ) -> (Vec<Registration>, Vec<Flush>) {
        if self.accumulator.is_torn_down() {
            log_warn!("ignoring rescan of {document_id} after teardown");
            return (Vec::new(), Vec::new());
        }

        let registrations = scan(document_id, nodes);
        let hides = self.visibility.sync(&registrations);
        let flushes = self.accumulator.on_visibility(&hides, now);
        (registrations, flushes)
    }

    fn emit(&mut self, flushes: &[Flush]) {
        for flush in flushes {
            let outcome = self.emitter.flush(&flush.source_id, flush.dwell_ms);
            self.stats.record(outcome);
        }
    }
}
