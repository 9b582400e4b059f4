use serde::{Deserialize, Serialize};

/// Raw page lifecycle signals as the host sees them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PageSignal {
    /// Document visibility changed (tab switch, minimize).
    VisibilityChange { hidden: bool },
    /// Page is being hidden for unload or bfcache; the last reliable signal.
    PageHide,
    /// Page restored from the back-forward cache.
    PageShow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PageTransition {
    WentBackground,
    WentForeground,
}

/// Collapses page signals into foreground/background transitions.
///
/// `visibilitychange(hidden)` and `pagehide` both arrive on a normal unload;
/// only the first produces a transition.
#[derive(Debug, Clone)]
pub struct PageForegroundMonitor {
    foreground: bool,
}

impl Default for PageForegroundMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PageForegroundMonitor {
    pub fn new(foreground: bool) -> Self {
        Self { foreground }
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }

    pub fn observe(&mut self, signal: PageSignal) -> Option<PageTransition> {
        let foreground = match signal {
            PageSignal::VisibilityChange { hidden } => !hidden,
            PageSignal::PageHide => false,
            PageSignal::PageShow => true,
        };

        if foreground == self.foreground {
            return None;
        }
        self.foreground = foreground;

        Some(if foreground {
            PageTransition::WentForeground
        } else {
            PageTransition::WentBackground
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hide_then_pagehide_is_one_transition() {
        let mut monitor = PageForegroundMonitor::default();

        assert_eq!(
            monitor.observe(PageSignal::VisibilityChange { hidden: true }),
            Some(PageTransition::WentBackground)
        );
        assert_eq!(monitor.observe(PageSignal::PageHide), None);
        assert!(!monitor.is_foreground());
    }

    #[test]
    fn pageshow_and_visible_both_restore_foreground_once() {
        let mut monitor = PageForegroundMonitor::new(false);

        assert_eq!(
            monitor.observe(PageSignal::PageShow),
            Some(PageTransition::WentForeground)
        );
        assert_eq!(
            monitor.observe(PageSignal::VisibilityChange { hidden: false }),
            None
        );
    }

    #[test]
    fn signal_deserializes_from_tagged_json() {
        let signal: PageSignal =
            serde_json::from_str(r#"{"kind":"visibility_change","hidden":true}"#).unwrap();
        assert_eq!(signal, PageSignal::VisibilityChange { hidden: true });

        let signal: PageSignal = serde_json::from_str(r#"{"kind":"page_hide"}"#).unwrap();
        assert_eq!(signal, PageSignal::PageHide);
    }
}
