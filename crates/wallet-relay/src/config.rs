//! Relay configuration.
//!
//! Read once at startup, either built in code or loaded from the
//! environment (with an optional `.env` file).

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use wallet_relay_core::PublicKey;
use wallet_relay_store::StoreConfig;

use crate::breaker::DEFAULT_MAX_STORAGE_FAILURES;
use crate::policy::{KindPolicy, DEFAULT_WALLET_KINDS};

/// Software URL advertised in relay metadata.
pub const SOFTWARE: &str = "https://github.com/bitvora/wallet-relay";

/// Version advertised in relay metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3334;

/// Limit applied to queries that do not set one.
pub const DEFAULT_QUERY_LIMIT: usize = 500;

/// Upper bound on any query limit.
pub const MAX_QUERY_LIMIT: usize = 5000;

/// Live events buffered per subscriber before it starts lagging.
pub const DEFAULT_SUBSCRIPTION_BUFFER: usize = 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The `.env` file exists but cannot be read.
    #[error("reading .env: {0}")]
    Dotenv(#[from] dotenvy::Error),
}

/// Display metadata about the relay and its operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayInfo {
    pub name: String,
    pub pubkey: Option<PublicKey>,
    pub description: String,
    pub icon: String,
    pub software: String,
    pub version: String,
}

impl Default for RelayInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            pubkey: None,
            description: String::new(),
            icon: String::new(),
            software: SOFTWARE.to_string(),
            version: VERSION.to_string(),
        }
    }
}

/// Caps applied to query limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLimits {
    /// Used when a filter has no limit.
    pub default_limit: usize,
    /// Explicit limits above this are clamped.
    pub max_limit: usize,
}

impl QueryLimits {
    /// Effective limit for a requested one.
    pub fn apply(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_QUERY_LIMIT,
            max_limit: MAX_QUERY_LIMIT,
        }
    }
}

/// Full relay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub info: RelayInfo,
    pub port: u16,
    pub store: StoreConfig,
    pub allowed_kinds: Vec<u16>,
    pub limits: QueryLimits,
    /// Consecutive storage failures before writes halt.
    pub max_storage_failures: u32,
    pub subscription_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            info: RelayInfo::default(),
            port: DEFAULT_PORT,
            store: StoreConfig::default(),
            allowed_kinds: DEFAULT_WALLET_KINDS.to_vec(),
            limits: QueryLimits::default(),
            max_storage_failures: DEFAULT_MAX_STORAGE_FAILURES,
            subscription_buffer: DEFAULT_SUBSCRIPTION_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a key lookup. Unset or empty keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(name) = get("RELAY_NAME") {
            config.info.name = name;
        }
        if let Some(pubkey) = get("RELAY_PUBKEY") {
            let pubkey = PublicKey::from_hex(pubkey.trim()).map_err(|e| ConfigError::Invalid {
                key: "RELAY_PUBKEY",
                reason: e.to_string(),
            })?;
            config.info.pubkey = Some(pubkey);
        }
        if let Some(description) = get("RELAY_DESCRIPTION") {
            config.info.description = description;
        }
        if let Some(icon) = get("RELAY_ICON") {
            config.info.icon = icon;
        }
        if let Some(port) = get("RELAY_PORT") {
            config.port = parse("RELAY_PORT", &port)?;
        }
        if let Some(path) = get("LMDB_PATH") {
            config.store.path = path.into();
        }
        if let Some(map_size) = get("LMDB_MAPSIZE") {
            config.store.map_size = parse("LMDB_MAPSIZE", &map_size)?;
        }
        if let Some(kinds) = get("RELAY_ALLOWED_KINDS") {
            config.allowed_kinds = kinds
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(|k| parse("RELAY_ALLOWED_KINDS", k))
                .collect::<Result<_, _>>()?;
        }
        if let Some(max_limit) = get("RELAY_MAX_LIMIT") {
            config.limits.max_limit = parse("RELAY_MAX_LIMIT", &max_limit)?;
            config.limits.default_limit = config.limits.default_limit.min(config.limits.max_limit);
        }

        Ok(config)
    }

    /// The admission policy this configuration describes.
    pub fn policy(&self) -> KindPolicy {
        KindPolicy::new(self.allowed_kinds.iter().copied())
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("{value:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.info.software, SOFTWARE);
        assert_eq!(config.limits.apply(None), 500);
        assert_eq!(config.limits.apply(Some(10_000)), 5000);
        assert_eq!(config.policy(), KindPolicy::wallet());
    }

    #[test]
    fn test_full_environment() {
        let pubkey = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
        let config = RelayConfig::from_lookup(lookup(&[
            ("RELAY_NAME", "wallet"),
            ("RELAY_PUBKEY", pubkey),
            ("RELAY_DESCRIPTION", "a wallet relay"),
            ("RELAY_ICON", "https://example.com/icon.png"),
            ("RELAY_PORT", "7447"),
            ("LMDB_PATH", "/var/lib/relay"),
            ("LMDB_MAPSIZE", "1073741824"),
            ("RELAY_ALLOWED_KINDS", "7375, 7376,10019"),
            ("RELAY_MAX_LIMIT", "100"),
        ]))
        .unwrap();

        assert_eq!(config.info.name, "wallet");
        assert_eq!(config.info.pubkey.unwrap().to_hex(), pubkey);
        assert_eq!(config.info.description, "a wallet relay");
        assert_eq!(config.info.icon, "https://example.com/icon.png");
        assert_eq!(config.port, 7447);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/relay"));
        assert_eq!(config.store.map_size, 1 << 30);
        assert_eq!(config.allowed_kinds, vec![7375, 7376, 10019]);
        assert_eq!(config.limits.max_limit, 100);
        assert_eq!(config.limits.apply(None), 100);
    }

    #[test]
    fn test_empty_values_keep_defaults() {
        let config =
            RelayConfig::from_lookup(lookup(&[("RELAY_PORT", ""), ("RELAY_PUBKEY", "  ")]))
                .unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.info.pubkey.is_none());
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("RELAY_PORT", "http"),
            ("RELAY_PORT", "70000"),
            ("LMDB_MAPSIZE", "-1"),
            ("RELAY_ALLOWED_KINDS", "7375,wallet"),
            ("RELAY_PUBKEY", "abcd"),
        ] {
            let err = RelayConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            match err {
                ConfigError::Invalid { key: k, .. } => assert_eq!(k, key),
                other => panic!("unexpected error {other}"),
            }
        }
    }
}
