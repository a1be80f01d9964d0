//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Postgres connection string. Without it progress is kept in memory only.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub log_level: Level,
    /// How often the remote store is probed to detect connectivity changes.
    pub probe_interval: Duration,
    pub cors_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            db_max_connections: 5,
            log_level: Level::INFO,
            probe_interval: Duration::from_secs(15),
            cors_origin: "http://localhost:3000".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Config::default();

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let db_max_connections = parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?;
        if db_max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "DB_MAX_CONNECTIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Sync Settings ---
        let probe_secs: u64 = parse_var("CONNECTIVITY_PROBE_SECS", defaults.probe_interval.as_secs())?;
        if probe_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "CONNECTIVITY_PROBE_SECS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let cors_origin = std::env::var("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            probe_interval: Duration::from_secs(probe_secs),
            cors_origin,
        })
    }
}
