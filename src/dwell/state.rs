use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryStatus {
    /// Element intersecting and page foreground; a span is open.
    Tracking,
    /// Entry kept but no span open (page backgrounded, or not yet re-intersected).
    Suspended,
}

/// Per-element dwell bookkeeping.
///
/// Times are monotonic milliseconds from the engine clock. `span_start` is set
/// exactly while the element is intersecting and the page is foreground.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEntry {
    pub source_id: String,
    /// Time from closed spans and ticker checkpoints not yet flushed.
    pub accumulated_ms: u64,
    pub span_start: Option<u64>,
}

impl TrackingEntry {
    pub fn begin(source_id: impl Into<String>, now: u64) -> Self {
        Self {
            source_id: source_id.into(),
            accumulated_ms: 0,
            span_start: Some(now),
        }
    }

    pub fn status(&self) -> EntryStatus {
        if self.span_start.is_some() {
            EntryStatus::Tracking
        } else {
            EntryStatus::Suspended
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.status() == EntryStatus::Tracking
    }

    fn open_span_ms(&self, now: u64) -> u64 {
        self.span_start
            .map(|start| now.saturating_sub(start))
            .unwrap_or(0)
    }

    /// Accumulated time plus whatever the open span has gathered so far.
    pub fn current_ms(&self, now: u64) -> u64 {
        self.accumulated_ms.saturating_add(self.open_span_ms(now))
    }

    /// Roll the open span into `accumulated_ms` and restart it at `now`.
    pub fn checkpoint(&mut self, now: u64) {
        if let Some(start) = self.span_start {
            self.accumulated_ms = self.accumulated_ms.saturating_add(now.saturating_sub(start));
            self.span_start = Some(now.max(start));
        }
    }

    /// Close the open span and zero the entry, returning the closed total.
    pub fn suspend(&mut self, now: u64) -> u64 {
        let closed = self.current_ms(now);
        self.accumulated_ms = 0;
        self.span_start = None;
        closed
    }

    pub fn resume(&mut self, now: u64) {
        if self.span_start.is_none() {
            self.span_start = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_rolls_span_without_changing_total() {
        let mut entry = TrackingEntry::begin("doc_section_0", 0);
        entry.checkpoint(500);
        assert_eq!(entry.accumulated_ms, 500);
        assert_eq!(entry.span_start, Some(500));

        entry.checkpoint(1000);
        assert_eq!(entry.accumulated_ms, 1000);
        assert_eq!(entry.current_ms(1200), 1200);
    }

    #[test]
    fn checkpoint_is_noop_while_suspended() {
        let mut entry = TrackingEntry::begin("a", 100);
        entry.suspend(400);
        entry.checkpoint(900);
        assert_eq!(entry.accumulated_ms, 0);
        assert_eq!(entry.status(), EntryStatus::Suspended);
    }

    #[test]
    fn suspend_returns_closed_total_and_resets() {
        let mut entry = TrackingEntry::begin("a", 0);
        entry.checkpoint(500);
        assert_eq!(entry.suspend(700), 700);
        assert_eq!(entry.accumulated_ms, 0);
        assert_eq!(entry.span_start, None);

        entry.resume(5700);
        assert_eq!(entry.current_ms(6000), 300);
    }

    #[test]
    fn clock_going_backwards_contributes_nothing() {
        let mut entry = TrackingEntry::begin("a", 1000);
        entry.checkpoint(900);
        assert_eq!(entry.accumulated_ms, 0);
        assert_eq!(entry.span_start, Some(1000));
        assert_eq!(entry.current_ms(800), 0);
    }

    #[test]
    fn resume_does_not_restart_an_open_span() {
        let mut entry = TrackingEntry::begin("a", 0);
        entry.resume(300);
        assert_eq!(entry.span_start, Some(0));
    }
}
