//! Server configuration.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Backing store selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Process-local map. Records vanish on restart.
    #[default]
    Memory,
    /// SQLite database file.
    Sqlite {
        /// Database path, or `:memory:`.
        path: String,
    },
}

/// Configuration for the match server.
#[derive(Debug, Clone, Getters, Setters, Serialize, Deserialize)]
#[serde(default)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,

    /// Port to bind. `0` picks a free port.
    port: u16,

    /// Origin used in share links. Defaults to `http://{host}:{port}`.
    #[setters(strip_option)]
    public_origin: Option<String>,

    /// Backing store.
    store: StoreConfig,

    /// Days a record survives without writes.
    match_ttl_days: u64,

    /// Seconds an unused coordinator lingers before retiring.
    coordinator_idle_secs: u64,

    /// Id draws before creation gives up.
    id_attempts: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            public_origin: None,
            store: StoreConfig::default(),
            match_ttl_days: 30,
            coordinator_idle_secs: 300,
            id_attempts: 8,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        info!(host = %config.host, port = config.port, store = ?config.store, "Config loaded successfully");
        Ok(config)
    }

    /// Rejects settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id_attempts == 0 {
            return Err(ConfigError::new("id_attempts must be at least 1".to_string()));
        }
        if self.match_ttl_days == 0 {
            return Err(ConfigError::new("match_ttl_days must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Origin prefixed to share links.
    pub fn share_origin(&self) -> String {
        match &self.public_origin {
            Some(origin) => origin.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    /// Record lifetime after each write.
    pub fn match_ttl(&self) -> Duration {
        Duration::from_secs(self.match_ttl_days * 24 * 60 * 60)
    }

    /// Idle period after which a coordinator retires.
    pub fn coordinator_idle(&self) -> Duration {
        Duration::from_secs(self.coordinator_idle_secs)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
