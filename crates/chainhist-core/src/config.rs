//! Process configuration.
//!
//! Built once at startup and passed by reference into every component.
//! Nothing in the pipeline reads environment variables directly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::policy::PolicyFilter;

/// Configuration for one ingestion instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistConfig {
    /// Chain slug used in policy entries and ABI store keys, e.g. `"eos"`.
    pub chain: String,
    /// `true` when following the chain head, `false` for backfill workers.
    #[serde(default)]
    pub live_mode: bool,
    /// Enables verbose per-key debug logging.
    #[serde(default)]
    pub debug: bool,
    /// Soft per-block processing budget in milliseconds.
    #[serde(default = "default_latency_warn_ms")]
    pub latency_warn_ms: u64,
    /// `chain::account::action` or `chain::account::*` entries to drop.
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Entries to keep; empty means keep everything not blacklisted.
    #[serde(default)]
    pub whitelist: Vec<String>,
}

fn default_latency_warn_ms() -> u64 {
    10
}

impl HistConfig {
    /// A backfill-mode config for `chain` with no policy entries.
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            live_mode: false,
            debug: false,
            latency_warn_ms: default_latency_warn_ms(),
            blacklist: vec![],
            whitelist: vec![],
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and policy entry syntax.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "chain".into(),
            });
        }
        PolicyFilter::from_config(self).map(|_| ())
    }

    pub fn with_live_mode(mut self, live: bool) -> Self {
        self.live_mode = live;
        self
    }

    pub fn with_blacklist(mut self, entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.blacklist.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn with_whitelist(mut self, entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.whitelist.extend(entries.into_iter().map(Into::into));
        self
    }

    /// The soft latency budget as a `Duration`.
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_warn_ms)
    }
}
