//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/linetrace/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/linetrace/` (~/.config/linetrace/)
//! - Data: `$XDG_DATA_HOME/linetrace/` (~/.local/share/linetrace/)
//! - State/Logs: `$XDG_STATE_HOME/linetrace/` (~/.local/state/linetrace/)
//!
//! A handful of settings can be overridden from the environment after the
//! file is parsed:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `LINETRACE_DB_PATH` | `storage.database_path` |
//! | `LINETRACE_CACHE_TTL` | `metrics.cache_ttl_secs` |
//! | `LINETRACE_RETENTION_DAYS` | `storage.retention_days` |
//! | `LINETRACE_LOG_LEVEL` | `logging.level` |

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Metrics computation and caching
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Storage location and retention
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics cache configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// Seconds a computed result stays valid in the cache
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Maximum cached results (0 = unbounded)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    1024
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Override for the SQLite database location
    pub database_path: Option<PathBuf>,

    /// Records older than this many days are removed by `cleanup`
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    30
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path, then apply env overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Apply `LINETRACE_*` overrides using `lookup` to read variables.
    ///
    /// Unparseable numbers are logged and skipped.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("LINETRACE_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup("LINETRACE_CACHE_TTL") {
            match raw.parse::<u64>() {
                Ok(ttl) => self.metrics.cache_ttl_secs = ttl,
                Err(_) => tracing::warn!(value = %raw, "Invalid integer for LINETRACE_CACHE_TTL"),
            }
        }

        if let Some(raw) = lookup("LINETRACE_RETENTION_DAYS") {
            match raw.parse::<u32>() {
                Ok(days) => self.storage.retention_days = days,
                Err(_) => {
                    tracing::warn!(value = %raw, "Invalid integer for LINETRACE_RETENTION_DAYS")
                }
            }
        }

        if let Some(level) = lookup("LINETRACE_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.metrics.cache_ttl_secs == 0 {
            return Err(Error::Config(
                "metrics.cache_ttl_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path, honouring `storage.database_path`
    pub fn resolved_database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/linetrace/config.toml` (~/.config/linetrace/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("linetrace").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/linetrace/` (~/.local/share/linetrace/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("linetrace")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/linetrace/` (~/.local/state/linetrace/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("linetrace")
    }

    /// Returns the default database file path
    ///
    /// `$XDG_DATA_HOME/linetrace/data.db` (~/.local/share/linetrace/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/linetrace/linetrace.log` (~/.local/state/linetrace/linetrace.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("linetrace.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
