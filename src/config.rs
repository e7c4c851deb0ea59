//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Upstream search API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Base URL of the search API (no trailing slash)
    pub base_url: String,
    /// Bearer token used for every request
    pub bearer_token: String,
}

/// Background synchronization configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Seconds between periodic recent-sync passes
    pub resync_interval_secs: u64,
    /// Default seconds to wait before reconnecting the live stream
    pub reconnect_delay_secs: u64,
    /// Posts requested per dashboard on a recent-sync pass (10..=100)
    pub max_results: u32,
    /// Posts retained per dashboard, newest first
    pub retention_max: u32,
    /// Capacity of the job queue; submitters wait when it is full
    pub job_queue_capacity: usize,
}

impl SyncConfig {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (DRIFTBOARD_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/driftboard.db")?
            .set_default("search.base_url", "https://api.twitter.com/2")?
            .set_default("sync.resync_interval_secs", 300)?
            .set_default("sync.reconnect_delay_secs", 60)?
            .set_default("sync.max_results", 100)?
            .set_default("sync.retention_max", 10)?
            .set_default("sync.job_queue_capacity", 256)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (DRIFTBOARD_*)
            .add_source(
                Environment::with_prefix("DRIFTBOARD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.search.bearer_token.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "search.bearer_token must be set".to_string(),
            ));
        }

        url::Url::parse(&self.search.base_url).map_err(|e| {
            crate::error::AppError::Config(format!("search.base_url is not a valid URL: {e}"))
        })?;

        if !(10..=100).contains(&self.sync.max_results) {
            return Err(crate::error::AppError::Config(
                "sync.max_results must be between 10 and 100".to_string(),
            ));
        }

        if self.sync.retention_max == 0 {
            return Err(crate::error::AppError::Config(
                "sync.retention_max must be greater than 0".to_string(),
            ));
        }

        if self.sync.job_queue_capacity == 0 {
            return Err(crate::error::AppError::Config(
                "sync.job_queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.sync.resync_interval_secs == 0 {
            return Err(crate::error::AppError::Config(
                "sync.resync_interval_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
