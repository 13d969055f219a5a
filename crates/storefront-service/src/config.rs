//! Storefront configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use storefront_core::entitlement::PermanentGrantPolicy;
use storefront_db::DbConfig;

/// Default SQLite file.
pub const DEFAULT_DB_PATH: &str = "./storefront.db";

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    pub db_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// What a new grant does to a permanent one
    pub permanent_grants: PermanentGrantPolicy,

    /// Buffered events per subscriber before the slowest one lags
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_connections: 5,
            permanent_grants: PermanentGrantPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                      | Default             |
    /// |-------------------------------|---------------------|
    /// | `STOREFRONT_DB_PATH`          | `./storefront.db`   |
    /// | `STOREFRONT_MAX_CONNECTIONS`  | `5`                 |
    /// | `STOREFRONT_PERMANENT_GRANTS` | `reject`            |
    /// | `STOREFRONT_EVENT_CAPACITY`   | `256`               |
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = StoreConfig::default();

        let config = StoreConfig {
            db_path: lookup("STOREFRONT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),

            max_connections: match lookup("STOREFRONT_MAX_CONNECTIONS") {
                Some(raw) => raw.parse().map_err(|_| {
                    ConfigError::InvalidValue("STOREFRONT_MAX_CONNECTIONS".to_string())
                })?,
                None => defaults.max_connections,
            },

            permanent_grants: match lookup("STOREFRONT_PERMANENT_GRANTS") {
                Some(raw) => raw.parse().map_err(|_| {
                    ConfigError::InvalidValue("STOREFRONT_PERMANENT_GRANTS".to_string())
                })?,
                None => defaults.permanent_grants,
            },

            event_capacity: match lookup("STOREFRONT_EVENT_CAPACITY") {
                Some(raw) => raw.parse().map_err(|_| {
                    ConfigError::InvalidValue("STOREFRONT_EVENT_CAPACITY".to_string())
                })?,
                None => defaults.event_capacity,
            },
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("STOREFRONT_MAX_CONNECTIONS".to_string()));
        }
        // tokio's broadcast channel panics on zero capacity
        if config.event_capacity == 0 {
            return Err(ConfigError::InvalidValue("STOREFRONT_EVENT_CAPACITY".to_string()));
        }

        Ok(config)
    }

    /// Database settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.db_path).max_connections(self.max_connections)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.permanent_grants, PermanentGrantPolicy::Reject);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("STOREFRONT_DB_PATH", "/tmp/shop.db"),
            ("STOREFRONT_MAX_CONNECTIONS", "8"),
            ("STOREFRONT_PERMANENT_GRANTS", "replace"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/shop.db"));
        assert_eq!(config.db_config().max_connections, 8);
        assert_eq!(config.permanent_grants, PermanentGrantPolicy::Replace);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            StoreConfig::from_lookup(lookup(&[("STOREFRONT_MAX_CONNECTIONS", "many")])),
            Err(ConfigError::InvalidValue(key)) if key == "STOREFRONT_MAX_CONNECTIONS"
        ));
        let bad_policy = lookup(&[("STOREFRONT_PERMANENT_GRANTS", "extend")]);
        assert!(StoreConfig::from_lookup(bad_policy).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("STOREFRONT_EVENT_CAPACITY", "0")])).is_err());
    }
}
