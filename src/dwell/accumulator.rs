use serde::Serialize;
use std::collections::BTreeMap;

use crate::foreground::PageTransition;
use crate::models::ElementId;
use crate::visibility::Transition;

use super::{state::TrackingEntry, store::DwellStore};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FlushReason {
    Hidden,
    Background,
    Teardown,
}

/// A finalized measurement ready for the emitter.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Flush {
    pub element: ElementId,
    pub source_id: String,
    pub dwell_ms: u64,
    pub reason: FlushReason,
}

/// Per-element dwell state machine.
///
/// Owns the store. Every handler takes the dispatch timestamp from its caller
/// and returns the flushes it produced; nothing here performs delivery.
#[derive(Debug)]
pub struct DwellAccumulator {
    store: DwellStore,
    /// Elements the visibility source last reported as intersecting, with
    /// their labels, whether or not they currently have an entry.
    intersecting: BTreeMap<ElementId, String>,
    foreground: bool,
    torn_down: bool,
}

impl DwellAccumulator {
    pub fn new(foreground: bool) -> Self {
        Self {
            store: DwellStore::new(),
            intersecting: BTreeMap::new(),
            foreground,
            torn_down: false,
        }
    }

    pub fn store(&self) -> &DwellStore {
        &self.store
    }

    pub fn entry(&self, element: ElementId) -> Option<&TrackingEntry> {
        self.store.get(element)
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn on_visibility(&mut self, batch: &[Transition], now: u64) -> Vec<Flush> {
        if self.reject_after_teardown("visibility batch") {
            return Vec::new();
        }

        let mut flushes = Vec::new();
        for transition in batch {
            if transition.visible {
                self.on_intersecting(transition, now);
            } else if let Some(flush) = self.on_hidden(transition.element, now) {
                flushes.push(flush);
            }
        }
        flushes
    }

    fn on_intersecting(&mut self, transition: &Transition, now: u64) {
        self.intersecting
            .insert(transition.element, transition.source_id.clone());

        if !self.foreground {
            // Registered on the next foreground transition.
            return;
        }

        match self.store.get_mut(transition.element) {
            Some(entry) if entry.is_tracking() => {}
            Some(entry) => entry.resume(now),
            None => {
                self.store.insert(
                    transition.element,
                    TrackingEntry::begin(transition.source_id.clone(), now),
                );
                log_debug!("tracking {} ({})", transition.source_id, transition.element);
            }
        }
    }

    fn on_hidden(&mut self, element: ElementId, now: u64) -> Option<Flush> {
        self.intersecting.remove(&element);

        let entry = self.store.remove(element)?;
        Some(Flush {
            element,
            dwell_ms: entry.current_ms(now),
            source_id: entry.source_id,
            reason: FlushReason::Hidden,
        })
    }

    /// Roll elapsed time into every open span. Never flushes.
    pub fn on_tick(&mut self, now: u64) {
        if self.torn_down || !self.foreground {
            return;
        }
        for (_, entry) in self.store.iter_mut() {
            entry.checkpoint(now);
        }
    }

    pub fn on_page(&mut self, transition: PageTransition, now: u64) -> Vec<Flush> {
        if self.reject_after_teardown("page transition") {
            return Vec::new();
        }

        match transition {
            PageTransition::WentBackground => self.went_background(now),
            PageTransition::WentForeground => {
                self.went_foreground(now);
                Vec::new()
            }
        }
    }

    fn went_background(&mut self, now: u64) -> Vec<Flush> {
        if !self.foreground {
            return Vec::new();
        }
        self.foreground = false;

        // Entries stay: the element may still be intersecting when the page
        // comes back.
        self.store
            .iter_mut()
            .filter(|(_, entry)| entry.is_tracking())
            .map(|(element, entry)| Flush {
                element,
                source_id: entry.source_id.clone(),
                dwell_ms: entry.suspend(now),
                reason: FlushReason::Background,
            })
            .collect()
    }

    fn went_foreground(&mut self, now: u64) {
        if self.foreground {
            return;
        }
        self.foreground = true;

        for (element, source_id) in &self.intersecting {
            match self.store.get_mut(*element) {
                Some(entry) => entry.resume(now),
                None => self
                    .store
                    .insert(*element, TrackingEntry::begin(source_id.clone(), now)),
            }
        }
    }

    /// Flush every entry regardless of state and clear all tracking state.
    /// Later calls are ignored.
    pub fn teardown(&mut self, now: u64) -> Vec<Flush> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        self.intersecting.clear();

        self.store
            .drain()
            .into_iter()
            .map(|(element, entry)| Flush {
                element,
                dwell_ms: entry.current_ms(now),
                source_id: entry.source_id,
                reason: FlushReason::Teardown,
            })
            .collect()
    }

    fn reject_after_teardown(&self, what: &str) -> bool {
        if self.torn_down {
            log_warn!("dropping {what} received after teardown");
        }
        self.torn_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn show(id: u64) -> Transition {
        Transition {
            element: ElementId(id),
            source_id: format!("doc_section_{id}"),
            visible: true,
        }
    }

    fn hide(id: u64) -> Transition {
        Transition {
            visible: false,
            ..show(id)
        }
    }

    #[test]
    fn visible_then_hidden_flushes_span() {
        let mut acc = DwellAccumulator::new(true);
        assert!(acc.on_visibility(&[show(1)], 0).is_empty());

        let flushes = acc.on_visibility(&[hide(1)], 1500);
        assert_eq!(flushes.len(), 1);
        assert_eq!(flushes[0].dwell_ms, 1500);
        assert_eq!(flushes[0].reason, FlushReason::Hidden);
        assert!(acc.store().is_empty());
    }

    #[test]
    fn duplicate_registration_keeps_span() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1)], 100);
        acc.on_tick(600);
        acc.on_visibility(&[show(1)], 800);

        let entry = acc.entry(ElementId(1)).unwrap();
        assert_eq!(entry.accumulated_ms, 500);
        assert_eq!(entry.span_start, Some(600));
    }

    #[test]
    fn ticks_roll_accumulation() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1)], 0);
        acc.on_tick(500);
        acc.on_tick(1000);
        assert_eq!(acc.entry(ElementId(1)).unwrap().accumulated_ms, 1000);

        let flushes = acc.on_visibility(&[hide(1)], 1200);
        assert_eq!(flushes[0].dwell_ms, 1200);
    }

    #[test]
    fn hide_for_unknown_element_is_noop() {
        let mut acc = DwellAccumulator::new(true);
        assert!(acc.on_visibility(&[hide(4)], 10).is_empty());
    }

    #[test]
    fn background_flushes_and_suspends_without_removing() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1), show(2)], 0);

        let flushes = acc.on_page(PageTransition::WentBackground, 700);
        assert_eq!(flushes.len(), 2);
        assert!(flushes.iter().all(|f| f.dwell_ms == 700));
        assert!(flushes.iter().all(|f| f.reason == FlushReason::Background));

        assert_eq!(acc.store().len(), 2);
        assert!(acc.store().iter().all(|(_, e)| !e.is_tracking() && e.accumulated_ms == 0));

        // pagehide after visibilitychange
        assert!(acc.on_page(PageTransition::WentBackground, 710).is_empty());
    }

    #[test]
    fn ticks_while_background_do_not_accumulate() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1)], 0);
        acc.on_page(PageTransition::WentBackground, 700);
        acc.on_tick(1200);
        acc.on_tick(5700);
        acc.on_page(PageTransition::WentForeground, 5700);

        let flushes = acc.on_visibility(&[hide(1)], 6000);
        assert_eq!(flushes[0].dwell_ms, 300);
    }

    #[test]
    fn element_scrolled_away_while_background_starts_fresh_on_return() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1)], 0);
        acc.on_page(PageTransition::WentBackground, 700);
        acc.on_visibility(&[hide(1)], 900);

        assert!(acc.on_page(PageTransition::WentForeground, 2000).is_empty());
        assert!(acc.entry(ElementId(1)).is_none());

        acc.on_visibility(&[show(1)], 2500);
        let entry = acc.entry(ElementId(1)).unwrap();
        assert_eq!(entry.accumulated_ms, 0);
        assert_eq!(entry.span_start, Some(2500));
    }

    #[test]
    fn hide_while_suspended_flushes_zero_and_removes() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1)], 0);
        acc.on_page(PageTransition::WentBackground, 1500);

        let flushes = acc.on_visibility(&[hide(1)], 1600);
        assert_eq!(flushes[0].dwell_ms, 0);
        assert!(acc.store().is_empty());
    }

    #[test]
    fn intersecting_while_background_registers_on_foreground() {
        let mut acc = DwellAccumulator::new(false);
        acc.on_visibility(&[show(3)], 100);
        assert!(acc.store().is_empty());

        acc.on_page(PageTransition::WentForeground, 400);
        assert_eq!(acc.entry(ElementId(3)).unwrap().span_start, Some(400));
    }

    #[test]
    fn teardown_flushes_everything_once() {
        let mut acc = DwellAccumulator::new(true);
        acc.on_visibility(&[show(1), show(2)], 0);
        acc.on_visibility(&[hide(2)], 200);
        acc.on_visibility(&[show(2)], 300);
        acc.on_page(PageTransition::WentBackground, 1000);
        acc.on_page(PageTransition::WentForeground, 1500);
        acc.on_tick(2000);

        let flushes = acc.teardown(2400);
        assert_eq!(
            flushes.iter().map(|f| (f.element.0, f.dwell_ms)).collect::<Vec<_>>(),
            vec![(1, 900), (2, 900)]
        );
        assert!(acc.store().is_empty());
        assert!(acc.is_torn_down());

        assert!(acc.teardown(3000).is_empty());
        assert!(acc.on_visibility(&[show(1)], 3000).is_empty());
        assert!(acc.store().is_empty());
    }
}
