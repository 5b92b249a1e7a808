use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Tunables of the performance pipeline.
///
/// Deserializable from the `[performance]` table of the server's TOML config;
/// every field has a default so an empty table is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceSettings {
    /// Upper bound on concurrent per-symbol price history fetches.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// A symbol whose history takes longer than this is skipped.
    #[serde(default = "default_symbol_fetch_timeout_secs")]
    pub symbol_fetch_timeout_secs: u64,

    /// Whole-request deadline; exceeding it cancels the request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional API keys for providers that require them.
    /// Keys: provider name (e.g., "alphavantage").
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_symbol_fetch_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl PerformanceSettings {
    pub fn symbol_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.symbol_fetch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Concurrency bound, never below 1.
    pub fn fetch_concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            symbol_fetch_timeout_secs: default_symbol_fetch_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            api_keys: HashMap::new(),
        }
    }
}
