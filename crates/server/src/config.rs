//! Server configuration.

use serde::{Deserialize, Serialize};

use household_ledger_core::PerformanceSettings;

/// Server configuration, loaded from TOML.
///
/// ```toml
/// host = "127.0.0.1"
/// port = 8080
/// seed_file = "config/seed.json"
///
/// [performance]
/// max_concurrent_fetches = 8
/// symbol_fetch_timeout_secs = 10
/// request_timeout_secs = 30
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON file with portfolios, holdings and cash to load into the in-memory store
    pub seed_file: Option<String>,

    /// Performance pipeline tunables
    #[serde(default)]
    pub performance: PerformanceSettings,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            seed_file: None,
            performance: PerformanceSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, std::io::Error> {
        toml::from_str(content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
