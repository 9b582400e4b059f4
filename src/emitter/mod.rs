pub mod beacon;
pub mod recording;

pub use beacon::BeaconTransport;
pub use recording::RecordingTransport;

use serde::Serialize;
use std::sync::Arc;

use crate::models::DwellEvent;
use crate::settings::DwellSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

/// Fire-and-forget delivery, `sendBeacon` style: `submit` only reports whether
/// the request was queued. It must not block and must be safe during teardown.
pub trait Transport: Send + Sync {
    fn submit(&self, url: &str, body: String) -> bool;
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FlushOutcome {
    /// Below the minimum dwell; no request made.
    Discarded,
    Queued,
    /// The transport refused the request or the body could not be encoded.
    Rejected,
}

pub struct Emitter {
    transport: Arc<dyn Transport>,
    collect_url: String,
    min_dwell_ms: u64,
    session_id: String,
}

impl Emitter {
    pub fn new(settings: &DwellSettings, session_id: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            collect_url: settings.collect_url(),
            min_dwell_ms: settings.min_dwell_ms,
            session_id: session_id.to_string(),
        }
    }

    pub fn collect_url(&self) -> &str {
        &self.collect_url
    }

    /// Hand one measurement to the transport. Never fails: the caller must
    /// not branch on delivery.
    pub fn flush(&self, source_id: &str, dwell_ms: u64) -> FlushOutcome {
        if dwell_ms == 0 || dwell_ms < self.min_dwell_ms {
            log_debug!(
                "discarding {}ms dwell for {} (below {}ms)",
                dwell_ms,
                source_id,
                self.min_dwell_ms
            );
            return FlushOutcome::Discarded;
        }

        let event = DwellEvent::human_dwell(source_id, dwell_ms, &self.session_id);
        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(err) => {
                log_error!("failed to encode dwell event for {source_id}: {err}");
                return FlushOutcome::Rejected;
            }
        };

        if self.transport.submit(&self.collect_url, body) {
            log_info!(
                "dwell event queued: {} {}ms to {}",
                source_id,
                dwell_ms,
                self.collect_url
            );
            FlushOutcome::Queued
        } else {
            log_error!(
                "dwell event rejected by transport: {} {}ms to {}",
                source_id,
                dwell_ms,
                self.collect_url
            );
            FlushOutcome::Rejected
        }
    }
}
