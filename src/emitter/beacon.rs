use anyhow::{Context, Result};
use reqwest::{header::CONTENT_TYPE, Client, Url};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

use super::Transport;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// HTTP POST transport that never waits for the response.
///
/// Each submit spawns one request on the runtime captured at construction;
/// outcomes are logged and otherwise ignored. Requests are tracked so a host
/// shutting down can give them a bounded chance to finish.
#[derive(Clone)]
pub struct BeaconTransport {
    client: Client,
    runtime: Handle,
    in_flight: TaskTracker,
}

impl BeaconTransport {
    /// Must be called from inside a tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current().context("beacon transport needs a tokio runtime")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            runtime,
            in_flight: TaskTracker::new(),
        })
    }

    /// The collector URL must be absolute; there is no page origin to
    /// resolve a relative one against.
    pub fn check_endpoint(url: &str) -> Result<Url> {
        Url::parse(url).with_context(|| format!("collector URL '{url}' is not absolute"))
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Stop accepting new requests and wait up to `timeout` for queued ones.
    /// Returns whether everything finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.in_flight.close();
        let pending = self.in_flight.len();
        if pending == 0 {
            return true;
        }

        log_info!("waiting up to {:?} for {} dwell event(s) in flight", timeout, pending);
        match tokio::time::timeout(timeout, self.in_flight.wait()).await {
            Ok(()) => true,
            Err(_) => {
                log_warn!("{} dwell event(s) still in flight at shutdown", self.in_flight.len());
                false
            }
        }
    }
}

impl Transport for BeaconTransport {
    fn submit(&self, url: &str, body: String) -> bool {
        if self.in_flight.is_closed() {
            return false;
        }

        let url = match Self::check_endpoint(url) {
            Ok(url) => url,
            Err(err) => {
                log_error!("cannot deliver dwell event: {err:#}");
                return false;
            }
        };

        let request = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        self.in_flight.spawn_on(
            async move {
                match request.send().await {
                    Ok(response) if response.status().is_success() => {}
                    Ok(response) => {
                        log_warn!("collector at {} answered {}", url, response.status());
                    }
                    Err(err) => {
                        log_error!("dwell event delivery to {} failed: {err}", url);
                    }
                }
            },
            &self.runtime,
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn relative_url_is_rejected_without_spawning() {
        let transport = BeaconTransport::new().unwrap();
        assert!(!transport.submit("/collect", "{}".into()));
        assert_eq!(transport.in_flight(), 0);
    }

    #[tokio::test]
    async fn closed_transport_refuses_new_requests() {
        let transport = BeaconTransport::new().unwrap();
        assert!(transport.drain(Duration::from_millis(10)).await);
        assert!(!transport.submit("http://127.0.0.1:9/collect", "{}".into()));
    }

    #[test]
    fn endpoint_must_be_absolute() {
        assert!(BeaconTransport::check_endpoint("/collect").is_err());
        let url = BeaconTransport::check_endpoint("http://localhost:8000/collect").unwrap();
        assert_eq!(url.path(), "/collect");
    }

    #[test]
    fn construction_outside_runtime_fails() {
        assert!(BeaconTransport::new().is_err());
    }
}
