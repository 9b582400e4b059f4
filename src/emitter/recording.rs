use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use crate::models::DwellEvent;

use super::Transport;

/// Keeps submitted requests in memory. Used for dry runs and tests.
#[derive(Debug)]
pub struct RecordingTransport {
    accept: AtomicBool,
    requests: Mutex<Vec<(String, String)>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            accept: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A transport that refuses to queue anything, like a failed `sendBeacon`.
    pub fn rejecting() -> Self {
        let transport = Self::new();
        transport.set_accepting(false);
        transport
    }

    pub fn set_accepting(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// `(url, body)` pairs in submission order.
    pub fn requests(&self) -> Vec<(String, String)> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Submitted bodies decoded back into events; undecodable bodies are skipped.
    pub fn events(&self) -> Vec<DwellEvent> {
        self.requests()
            .iter()
            .filter_map(|(_, body)| serde_json::from_str(body).ok())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn submit(&self, url: &str, body: String) -> bool {
        if !self.accept.load(Ordering::SeqCst) {
            return false;
        }

        let mut guard = match self.requests.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push((url.to_string(), body));
        true
    }
}
