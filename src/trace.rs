//! Recorded scroll sessions replayed by the `dwelltrack` binary.
//!
//! ```json
//! {
//!   "document_id": "dummy_doc_01",
//!   "steps": [
//!     { "at_ms": 0,    "step": "scan", "nodes": [{ "element": 1, "tag": "h1" }] },
//!     { "at_ms": 10,   "step": "intersections", "ratios": [[1, 1.0]] },
//!     { "at_ms": 2000, "step": "page", "signal": { "kind": "page_hide" } },
//!     { "at_ms": 2100, "step": "unmount" }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};
use tokio::time::{sleep_until, Instant};

use crate::dwell::DwellController;
use crate::foreground::PageSignal;
use crate::models::ElementId;
use crate::scan::ContentNode;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Trace {
    pub document_id: String,
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TraceStep {
    /// Offset from the start of the replay.
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: TraceAction,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraceAction {
    Scan { nodes: Vec<ContentNode> },
    Intersections { ratios: Vec<(ElementId, f64)> },
    Page { signal: PageSignal },
    Unmount,
}

impl Trace {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace from {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid trace in {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let trace: Trace = serde_json::from_str(contents)?;

        if let Some(pair) = trace.steps.windows(2).find(|w| w[1].at_ms < w[0].at_ms) {
            bail!(
                "steps must be in time order ({}ms follows {}ms)",
                pair[1].at_ms,
                pair[0].at_ms
            );
        }
        Ok(trace)
    }
}

/// Feed every step to the controller at its offset. Stops at the first
/// `unmount`; the caller still owns shutdown.
pub async fn replay(controller: &DwellController, trace: &Trace) -> Result<()> {
    let start = Instant::now();
    log_info!(
        "replaying {} step(s) for {}",
        trace.steps.len(),
        trace.document_id
    );

    for (index, step) in trace.steps.iter().enumerate() {
        sleep_until(start + Duration::from_millis(step.at_ms)).await;

        match &step.action {
            TraceAction::Scan { nodes } => {
                controller.rescan(trace.document_id.clone(), nodes.clone())?
            }
            TraceAction::Intersections { ratios } => controller.intersections(ratios.clone())?,
            TraceAction::Page { signal } => controller.page(*signal)?,
            TraceAction::Unmount => {
                let skipped = trace.steps.len() - index - 1;
                if skipped > 0 {
                    log_warn!("ignoring {skipped} step(s) after unmount");
                }
                break;
            }
        }
    }

    Ok(())
}
