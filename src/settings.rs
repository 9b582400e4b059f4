use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Fraction of an element's area that must intersect the viewport for it to
/// count as visible. Fixed; not part of the loaded settings.
pub const INTERSECTION_THRESHOLD: f64 = 0.5;

pub const COLLECT_ENDPOINT_PATH: &str = "/collect";

pub const DEFAULT_MIN_DWELL_MS: u64 = 1000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 500;

const ENV_COLLECT_URL: &str = "DWELLTRACK_COLLECT_URL";
const ENV_MIN_DWELL_MS: &str = "DWELLTRACK_MIN_DWELL_MS";
const ENV_TICK_MS: &str = "DWELLTRACK_TICK_MS";
const ENV_DEBUG: &str = "DWELLTRACK_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DwellSettings {
    /// Empty means same origin: events go to the bare `/collect` path.
    pub collect_base_url: String,
    pub min_dwell_ms: u64,
    pub tick_interval_ms: u64,
    pub debug: bool,
}

impl Default for DwellSettings {
    fn default() -> Self {
        Self {
            collect_base_url: String::new(),
            min_dwell_ms: DEFAULT_MIN_DWELL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            debug: false,
        }
    }
}

impl DwellSettings {
    /// Resolve settings once at startup: file (if any), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        let settings = base.with_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// A missing file is not an error; a malformed one falls back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        match serde_json::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                log_warn!(
                    "Ignoring malformed settings in {}: {err}; using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_COLLECT_URL) {
            self.collect_base_url = url;
        }

        if let Some(raw) = lookup(ENV_MIN_DWELL_MS) {
            self.min_dwell_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_MIN_DWELL_MS} must be an integer, got '{raw}'"))?;
        }

        if let Some(raw) = lookup(ENV_TICK_MS) {
            self.tick_interval_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TICK_MS} must be an integer, got '{raw}'"))?;
        }

        if let Some(raw) = lookup(ENV_DEBUG) {
            self.debug = raw == "1" || raw.eq_ignore_ascii_case("true");
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn collect_url(&self) -> String {
        format!(
            "{}{}",
            self.collect_base_url.trim_end_matches('/'),
            COLLECT_ENDPOINT_PATH
        )
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
