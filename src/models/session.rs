use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One per page load. The id is generated once and attached to every
/// outbound event for the lifetime of the engine that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
}

impl Session {
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
