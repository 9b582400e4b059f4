//! Turns raw intersection ratios from the host's viewport primitive into
//! visible/hidden transitions for the elements currently under observation.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::ElementId;
use crate::scan::Registration;
use crate::settings::INTERSECTION_THRESHOLD;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Transition {
    pub element: ElementId,
    pub source_id: String,
    pub visible: bool,
}

/// Transitions from one evaluation pass. The engine applies a whole batch
/// against a single timestamp.
pub type VisibilityBatch = Vec<Transition>;

#[derive(Debug)]
struct Observation {
    source_id: String,
    /// `None` until the first evaluation reports this element.
    last: Option<bool>,
}

#[derive(Debug)]
pub struct VisibilitySource {
    threshold: f64,
    observed: BTreeMap<ElementId, Observation>,
}

impl Default for VisibilitySource {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilitySource {
    pub fn new() -> Self {
        Self {
            threshold: INTERSECTION_THRESHOLD,
            observed: BTreeMap::new(),
        }
    }

    /// Start reporting for `element`. Observing an element twice keeps the
    /// first label and its last known state; returns whether it was new.
    pub fn observe(&mut self, element: ElementId, source_id: impl Into<String>) -> bool {
        if self.observed.contains_key(&element) {
            return false;
        }
        self.observed.insert(
            element,
            Observation {
                source_id: source_id.into(),
                last: None,
            },
        );
        true
    }

    /// Stop reporting for `element`. If it was last seen intersecting, the
    /// returned hide transition must be applied so its entry is closed.
    pub fn unobserve(&mut self, element: ElementId) -> Option<Transition> {
        let observation = self.observed.remove(&element)?;
        (observation.last == Some(true)).then(|| Transition {
            element,
            source_id: observation.source_id,
            visible: false,
        })
    }

    pub fn disconnect_all(&mut self) {
        self.observed.clear();
    }

    pub fn is_observed(&self, element: ElementId) -> bool {
        self.observed.contains_key(&element)
    }

    pub fn source_id(&self, element: ElementId) -> Option<&str> {
        self.observed.get(&element).map(|o| o.source_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.observed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observed.is_empty()
    }

    /// Reconcile the observed set with a fresh scan of the container.
    ///
    /// New elements are observed, vanished ones unobserved (yielding hides for
    /// any that were intersecting), and persisting ones are left untouched so
    /// their entries keep accumulating.
    pub fn sync(&mut self, registrations: &[Registration]) -> VisibilityBatch {
        let keep: BTreeMap<ElementId, &str> = registrations
            .iter()
            .map(|r| (r.element, r.source_id.as_str()))
            .collect();

        let dropped: Vec<ElementId> = self
            .observed
            .keys()
            .filter(|id| !keep.contains_key(id))
            .copied()
            .collect();

        let mut hides = Vec::new();
        for element in dropped {
            if let Some(hide) = self.unobserve(element) {
                hides.push(hide);
            }
        }

        let mut added = 0usize;
        for (element, source_id) in keep {
            if self.observe(element, source_id) {
                added += 1;
            }
        }

        log_debug!(
            "visibility sync: {} observed ({} new, {} closed by removal)",
            self.observed.len(),
            added,
            hides.len()
        );

        hides
    }

    /// Evaluate one batch of intersection ratios. Only state changes of
    /// observed elements are reported; unknown elements are ignored.
    pub fn evaluate(&mut self, ratios: &[(ElementId, f64)]) -> VisibilityBatch {
        let mut batch = Vec::new();

        for &(element, ratio) in ratios {
            let Some(observation) = self.observed.get_mut(&element) else {
                continue;
            };

            // NaN compares false, so a garbage ratio reads as hidden.
            let visible = ratio >= self.threshold;
            if observation.last == Some(visible) {
                continue;
            }
            observation.last = Some(visible);

            batch.push(Transition {
                element,
                source_id: observation.source_id.clone(),
                visible,
            });
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(id: u64, label: &str) -> Registration {
        Registration {
            element: ElementId(id),
            source_id: label.to_string(),
            assigned: false,
        }
    }

    #[test]
    fn threshold_is_half_the_area() {
        let mut source = VisibilitySource::new();
        source.observe(ElementId(1), "a");
        source.observe(ElementId(2), "b");
        source.observe(ElementId(3), "c");

        let batch = source.evaluate(&[
            (ElementId(1), 0.5),
            (ElementId(2), 0.49),
            (ElementId(3), f64::NAN),
        ]);

        assert_eq!(
            batch.iter().map(|t| (t.element.0, t.visible)).collect::<Vec<_>>(),
            vec![(1, true), (2, false), (3, false)]
        );
    }

    #[test]
    fn repeated_state_is_not_reported_again() {
        let mut source = VisibilitySource::new();
        source.observe(ElementId(1), "a");

        assert_eq!(source.evaluate(&[(ElementId(1), 0.9)]).len(), 1);
        assert!(source.evaluate(&[(ElementId(1), 0.7)]).is_empty());

        let hide = source.evaluate(&[(ElementId(1), 0.1)]);
        assert_eq!(hide.len(), 1);
        assert!(!hide[0].visible);
    }

    #[test]
    fn unobserved_elements_are_ignored() {
        let mut source = VisibilitySource::new();
        assert!(source.evaluate(&[(ElementId(9), 1.0)]).is_empty());
    }

    #[test]
    fn observe_twice_keeps_first_label() {
        let mut source = VisibilitySource::new();
        assert!(source.observe(ElementId(1), "first"));
        assert!(!source.observe(ElementId(1), "second"));
        assert_eq!(source.source_id(ElementId(1)), Some("first"));
    }

    #[test]
    fn unobserve_of_visible_element_yields_hide() {
        let mut source = VisibilitySource::new();
        source.observe(ElementId(1), "a");
        source.observe(ElementId(2), "b");
        source.evaluate(&[(ElementId(1), 1.0), (ElementId(2), 0.0)]);

        let hide = source.unobserve(ElementId(1)).unwrap();
        assert_eq!(hide.source_id, "a");
        assert!(!hide.visible);
        assert!(source.unobserve(ElementId(2)).is_none());
        assert!(source.is_empty());
    }

    #[test]
    fn sync_keeps_persisting_nodes_and_closes_removed_ones() {
        let mut source = VisibilitySource::new();
        source.sync(&[reg(1, "doc_section_0"), reg(2, "doc_section_1")]);
        source.evaluate(&[(ElementId(1), 1.0), (ElementId(2), 1.0)]);

        let hides = source.sync(&[reg(1, "doc_section_0"), reg(3, "doc_section_2")]);

        assert_eq!(hides.len(), 1);
        assert_eq!(hides[0].element, ElementId(2));
        assert!(source.is_observed(ElementId(1)));
        assert!(source.is_observed(ElementId(3)));
        assert!(!source.is_observed(ElementId(2)));

        // Element 1 is still known to be visible, so no duplicate show.
        assert!(source.evaluate(&[(ElementId(1), 1.0)]).is_empty());
    }
}
