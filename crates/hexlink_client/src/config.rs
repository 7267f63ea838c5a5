//! Client configuration.

use crate::error::ClientError;
use derive_getters::Getters;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for the sync agent and the command-line client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct ClientConfig {
    /// Base URL of the match server, without the `/api/games` suffix.
    #[setters(into)]
    server_url: String,

    /// JSON file holding the local identity and match directory.
    #[setters(into)]
    state_path: PathBuf,

    /// First reconnect delay in milliseconds.
    backoff_unit_ms: u64,

    /// Reconnect delays never exceed this many units.
    backoff_max_units: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8787".to_string(),
            state_path: PathBuf::from("hexlink-client.json"),
            backoff_unit_ms: 1000,
            backoff_max_units: 5,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        debug!("Loading client config");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ClientError::Config(format!("Failed to read config file: {}", e)))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))?;
        if config.backoff_max_units == 0 {
            return Err(ClientError::Config("backoff_max_units must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Duration of one backoff unit.
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.backoff_unit(), Duration::from_secs(1));
        assert_eq!(*config.backoff_max_units(), 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = \"http://games.example:9000\"").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server_url(), "http://games.example:9000");
        assert_eq!(*config.backoff_unit_ms(), 1000);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backoff_max_units = 0").unwrap();
        assert!(matches!(ClientConfig::from_file(file.path()), Err(ClientError::Config(_))));
    }
}
