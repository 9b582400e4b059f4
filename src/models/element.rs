use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle for a rendered content node.
///
/// The rendering collaborator owns the mapping between handles and real
/// elements; the engine only ever compares and orders them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}
