// ⚙️ Configuration - environment variables with defaults

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DB_ENV: &str = "CONTRACT_REGISTRY_DB";
pub const ADDR_ENV: &str = "CONTRACT_REGISTRY_ADDR";

pub const DEFAULT_DB_PATH: &str = "contracts.db";
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} is set but empty")]
    Empty { var: &'static str },

    #[error("{var}={value:?} is not a valid socket address")]
    InvalidAddr { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub server_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (tests pass a map instead of the process env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = match lookup(DB_ENV) {
            Some(v) if v.trim().is_empty() => return Err(ConfigError::Empty { var: DB_ENV }),
            Some(v) => PathBuf::from(v.trim()),
            None => PathBuf::from(DEFAULT_DB_PATH),
        };

        let raw_addr = lookup(ADDR_ENV).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let server_addr = raw_addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidAddr {
                var: ADDR_ENV,
                value: raw_addr.clone(),
            })?;

        Ok(Config {
            database_path,
            server_addr,
        })
    }
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("contracts.db"));
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:3000");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (DB_ENV, "/var/lib/registry/prod.db"),
            (ADDR_ENV, "0.0.0.0:8080"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/registry/prod.db"));
        assert_eq!(config.server_addr.port(), 8080);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            Config::from_lookup(lookup(&[(DB_ENV, "  ")])).unwrap_err(),
            ConfigError::Empty { var: DB_ENV }
        );
        assert!(matches!(
            Config::from_lookup(lookup(&[(ADDR_ENV, "localhost")])),
            Err(ConfigError::InvalidAddr { .. })
        ));
    }
}
