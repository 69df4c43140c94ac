//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "grantscan.toml",
    "config.toml",
    "./config/grantscan.toml",
    "/etc/grantscan/config.toml",
];

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "GRANTSCAN_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    search_standard_paths: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_path: None,
            search_standard_paths: true,
        }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
            search_standard_paths: true,
        }
    }

    /// Only consider the explicit path and `GRANTSCAN_CONFIG`
    pub fn without_search_paths(mut self) -> Self {
        self.search_standard_paths = false;
        self
    }

    /// Load configuration from file (if found) with environment variable overrides,
    /// then validate the result
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        // Start with defaults
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        // Check explicit path first
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if !self.search_standard_paths {
            return None;
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        // Engine
        if let Some(val) = parse_env("GRANTSCAN_CONCURRENCY")? {
            config.engine.concurrency = val;
        }
        if let Some(val) = parse_env("GRANTSCAN_AGGREGATOR_BUFFER")? {
            config.engine.aggregator_buffer = val;
        }

        // Pagination
        if let Some(val) = parse_env("GRANTSCAN_PAGE_SIZE")? {
            config.pagination.page_size = val;
        }

        // HTTP
        if let Some(val) = parse_env("GRANTSCAN_HTTP_TIMEOUT_MS")? {
            config.http.timeout_ms = val;
        }
        if let Ok(val) = env::var("GRANTSCAN_HTTP_USER_AGENT") {
            config.http.user_agent = val;
        }

        // Database
        if let Ok(val) = env::var("GRANTSCAN_DATABASE_URL") {
            config.database.url = val;
        }
        if let Some(val) = parse_env("GRANTSCAN_DATABASE_MAX_CONNECTIONS")? {
            config.database.max_connections = val;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read and parse an environment variable. Unset is `None`; set but unparseable is an error.
fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvError(format!("{} has an invalid value: {}", key, val))),
        Err(_) => Ok(None),
    }
}
