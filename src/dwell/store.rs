use std::collections::BTreeMap;

use crate::models::ElementId;

use super::state::TrackingEntry;

/// Arena of tracking entries keyed by the collaborator-assigned element id.
///
/// Single owner: only the accumulator holds one, and only engine dispatch
/// reaches it. Ordered so flush batches come out in a stable order.
#[derive(Debug, Default)]
pub struct DwellStore {
    entries: BTreeMap<ElementId, TrackingEntry>,
}

impl DwellStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: ElementId) -> Option<&TrackingEntry> {
        self.entries.get(&element)
    }

    pub fn get_mut(&mut self, element: ElementId) -> Option<&mut TrackingEntry> {
        self.entries.get_mut(&element)
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.entries.contains_key(&element)
    }

    pub fn insert(&mut self, element: ElementId, entry: TrackingEntry) {
        self.entries.insert(element, entry);
    }

    pub fn remove(&mut self, element: ElementId) -> Option<TrackingEntry> {
        self.entries.remove(&element)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &TrackingEntry)> {
        self.entries.iter().map(|(id, entry)| (*id, entry))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ElementId, &mut TrackingEntry)> {
        self.entries.iter_mut().map(|(id, entry)| (*id, entry))
    }

    /// Empty the store, handing back every entry in element order.
    pub fn drain(&mut self) -> Vec<(ElementId, TrackingEntry)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
