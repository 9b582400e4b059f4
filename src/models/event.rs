use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusKind {
    HumanDwell,
}

impl Default for FocusKind {
    fn default() -> Self {
        FocusKind::HumanDwell
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DwellPayload {
    pub doc_source: String,
}

/// Body posted to `<base>/collect` for one flushed measurement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DwellEvent {
    pub focus_ms: u64,
    pub payload: DwellPayload,
    pub focus_kind: FocusKind,
    pub session_id: String,
}

impl DwellEvent {
    pub fn human_dwell(doc_source: &str, focus_ms: u64, session_id: &str) -> Self {
        Self {
            focus_ms,
            payload: DwellPayload {
                doc_source: doc_source.to_string(),
            },
            focus_kind: FocusKind::HumanDwell,
            session_id: session_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_to_collector_wire_shape() {
        let event = DwellEvent::human_dwell("guide_section_2", 1500, "abc-123");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({
                "focus_ms": 1500,
                "payload": { "doc_source": "guide_section_2" },
                "focus_kind": "human_dwell",
                "session_id": "abc-123",
            })
        );
    }

    #[test]
    fn rejects_unknown_focus_kind() {
        let raw = r#"{"focus_ms":1,"payload":{"doc_source":"x"},"focus_kind":"exec_latency","session_id":"s"}"#;
        assert!(serde_json::from_str::<DwellEvent>(raw).is_err());
    }
}
