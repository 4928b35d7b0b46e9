//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TAVOLA_DB_PATH=/srv/tavola/tavola.db                               │
//! │     TAVOLA_LOG=info,tavola=trace                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tavola/engine.toml (Linux)                               │
//! │     ~/Library/Application Support/app.tavola.engine/engine.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/tavola/tavola.db"   # or ":memory:"
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [events]
//! enabled = true
//! capacity = 256
//!
//! [orders]
//! max_items = 100
//! guest_ordering = true
//!
//! [logging]
//! filter = "info,tavola=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use tavola_core::MAX_ORDER_ITEMS;
use tavola_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file, `:memory:` for a throwaway database.
    /// Default: `<data dir>/tavola.db`
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            run_migrations: true,
        }
    }
}

// =============================================================================
// Event Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    /// When false, events are dropped instead of broadcast.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Broadcast buffer; slow subscribers lag past this many events.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            enabled: true,
            capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// Order Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Maximum active lines per order (at most 100).
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Whether anonymous QR guests may place orders.
    #[serde(default = "default_true")]
    pub guest_ordering: bool,
}

fn default_max_items() -> usize {
    MAX_ORDER_ITEMS
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            max_items: default_max_items(),
            guest_ordering: true,
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info,tavola=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub orders: OrderSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Configuration for tests: in-memory database, defaults elsewhere.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = Some(PathBuf::from(":memory:"));
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> EngineResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.events.capacity == 0 {
            return Err(EngineError::Config(
                "events.capacity must be greater than 0".into(),
            ));
        }

        if !(1..=MAX_ORDER_ITEMS).contains(&self.orders.max_items) {
            return Err(EngineError::Config(format!(
                "orders.max_items must be between 1 and {}",
                MAX_ORDER_ITEMS
            )));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(EngineError::Config("logging.filter must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `TAVOLA_*` overrides read through `lookup`.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("TAVOLA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(max) = lookup("TAVOLA_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid TAVOLA_DB_MAX_CONNECTIONS"),
            }
        }

        if let Some(enabled) = lookup("TAVOLA_EVENTS_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.events.enabled = true,
                "0" | "false" | "no" => self.events.enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid TAVOLA_EVENTS_ENABLED"),
            }
        }

        if let Some(capacity) = lookup("TAVOLA_EVENT_CAPACITY") {
            if let Ok(c) = capacity.parse::<usize>() {
                self.events.capacity = c;
            }
        }

        if let Some(max) = lookup("TAVOLA_MAX_ORDER_ITEMS") {
            if let Ok(m) = max.parse::<usize>() {
                self.orders.max_items = m;
            }
        }

        if let Some(filter) = lookup("TAVOLA_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "tavola", "engine")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// Resolves the database settings into a pool configuration.
    ///
    /// Without an explicit path the database lives in the platform data
    /// directory.
    pub fn db_config(&self) -> EngineResult<DbConfig> {
        let path = match &self.database.path {
            Some(path) if path.as_os_str() == ":memory:" => return Ok(DbConfig::in_memory()),
            Some(path) => path.clone(),
            None => directories::ProjectDirs::from("app", "tavola", "engine")
                .map(|dirs| dirs.data_dir().join("tavola.db"))
                .ok_or_else(|| {
                    EngineError::Config("Could not determine app data directory".into())
                })?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(DbConfig::new(path)
            .max_connections(self.database.max_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .run_migrations(self.database.run_migrations))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.events.capacity, 256);
        assert_eq!(config.orders.max_items, MAX_ORDER_ITEMS);
        assert!(config.orders.guest_ordering);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = ":memory:"

            [orders]
            guest_ordering = false
            "#,
        )
        .unwrap();

        assert!(!config.orders.guest_ordering);
        assert_eq!(config.orders.max_items, MAX_ORDER_ITEMS);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.db_config().unwrap().is_in_memory());
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("TAVOLA_LOG", "warn"),
            ("TAVOLA_EVENTS_ENABLED", "false"),
            ("TAVOLA_DB_MAX_CONNECTIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.logging.filter, "warn");
        assert!(!config.events.enabled);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.orders.max_items = MAX_ORDER_ITEMS + 1;
        assert!(config.validate().is_err());

        config.orders.max_items = 10;
        config.events.capacity = 0;
        assert!(config.validate().is_err());

        config.events.capacity = 16;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = EngineConfig::from_toml("[orders]\nmax_items = \"many\"").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
