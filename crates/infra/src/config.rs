//! Environment-driven configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::ledger::DEFAULT_MAX_RETRIES;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is required: {reason}")]
    Missing { name: &'static str, reason: &'static str },

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Postgres-backed stores instead of in-memory ones.
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub waitlist_rate_limit: u64,
    pub waitlist_rate_window: Duration,
    pub ledger_max_retries: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let use_persistent_stores = parse_bool("USE_PERSISTENT_STORES", var("USE_PERSISTENT_STORES"))?;
        let database_url = var("DATABASE_URL");
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing {
                name: "DATABASE_URL",
                reason: "USE_PERSISTENT_STORES is enabled",
            });
        }

        let waitlist_rate_limit: u64 = parse_or("WAITLIST_RATE_LIMIT", var("WAITLIST_RATE_LIMIT"), 5)?;
        if waitlist_rate_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "WAITLIST_RATE_LIMIT",
                value: "0".to_string(),
            });
        }
        let window_secs: u64 = parse_or("WAITLIST_RATE_WINDOW_SECS", var("WAITLIST_RATE_WINDOW_SECS"), 3600)?;

        Ok(Self {
            bind_addr: parse_or("BIND_ADDR", var("BIND_ADDR"), SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            jwt_secret,
            use_persistent_stores,
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 10)?,
            redis_url: var("REDIS_URL"),
            waitlist_rate_limit,
            waitlist_rate_window: Duration::from_secs(window_secs),
            ledger_max_retries: parse_or("LEDGER_MAX_RETRIES", var("LEDGER_MAX_RETRIES"), DEFAULT_MAX_RETRIES)?,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            name,
            value: raw.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert!(!cfg.use_persistent_stores);
        assert_eq!(cfg.waitlist_rate_limit, 5);
        assert_eq!(cfg.waitlist_rate_window, Duration::from_secs(3600));
        assert_eq!(cfg.ledger_max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        let err = config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "DATABASE_URL", .. }));

        let cfg = config(&[
            ("USE_PERSISTENT_STORES", "1"),
            ("DATABASE_URL", "postgres://localhost/agrolog"),
        ])
        .unwrap();
        assert!(cfg.use_persistent_stores);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = config(&[("LEDGER_MAX_RETRIES", "many")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "LEDGER_MAX_RETRIES",
                value: "many".to_string()
            }
        );
        assert!(config(&[("USE_PERSISTENT_STORES", "maybe")]).is_err());
        assert!(config(&[("WAITLIST_RATE_LIMIT", "0")]).is_err());
        assert!(config(&[("BIND_ADDR", "localhost")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("JWT_SECRET", "  "), ("REDIS_URL", "")]).unwrap();
        assert_eq!(cfg.jwt_secret, DEV_JWT_SECRET);
        assert!(cfg.redis_url.is_none());
    }
}
