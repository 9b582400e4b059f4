use serde::{Deserialize, Serialize};

use crate::models::ElementId;

/// Tags treated as trackable content units inside the rendered container.
pub const TRACKABLE_TAGS: [&str; 5] = ["p", "h1", "h2", "h3", "li"];

/// A descendant node of the rendered container, in document order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentNode {
    pub element: ElementId,
    pub tag: String,
    /// Existing `doc_source` label on the node, if the renderer set one or an
    /// earlier scan assigned it.
    #[serde(default)]
    pub doc_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Registration {
    pub element: ElementId,
    pub source_id: String,
    /// True when the label was generated by this scan and should be written
    /// back onto the node by the renderer.
    pub assigned: bool,
}

pub fn is_trackable(tag: &str) -> bool {
    TRACKABLE_TAGS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(tag))
}

/// Select trackable nodes and give each a label.
///
/// Unlabelled nodes get `<document_id>_section_<n>`, where `n` is the node's
/// position among trackable nodes. Empty labels count as unlabelled.
pub fn scan(document_id: &str, nodes: &[ContentNode]) -> Vec<Registration> {
    nodes
        .iter()
        .filter(|node| is_trackable(&node.tag))
        .enumerate()
        .map(|(index, node)| match node.doc_source.as_deref() {
            Some(label) if !label.is_empty() => Registration {
                element: node.element,
                source_id: label.to_string(),
                assigned: false,
            },
            _ => Registration {
                element: node.element,
                source_id: format!("{document_id}_section_{index}"),
                assigned: true,
            },
        })
        .collect()
}
