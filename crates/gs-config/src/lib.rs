//! Grantscan Configuration System
//!
//! This crate provides TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub pagination: PaginationConfig,
    pub http: HttpConfig,
    pub database: DatabaseConfig,
}

/// Task pool and provenance aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of jobs running at once
    pub concurrency: usize,
    /// Ledger fragments the aggregator queue holds before producers wait
    pub aggregator_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            aggregator_buffer: 64,
        }
    }
}

/// Pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Items requested per page from APIs that accept a page size
    pub page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Headers injected into every request
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            user_agent: format!("grantscan/{}", env!("CARGO_PKG_VERSION")),
            headers: BTreeMap::new(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Relational source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 4,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "engine.concurrency must be at least 1".to_string(),
            ));
        }
        if self.engine.aggregator_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "engine.aggregator_buffer must be at least 1".to_string(),
            ));
        }
        if self.pagination.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "pagination.page_size must be at least 1".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Grantscan Configuration
# Environment variables (GRANTSCAN_*) override these settings

[engine]
concurrency = 10
aggregator_buffer = 64

[pagination]
page_size = 100

[http]
timeout_ms = 30000
user_agent = "grantscan"

[http.headers]
# Authorization = "Bearer ..."

[database]
url = ""
max_connections = 4
"#
        .to_string()
    }
}
