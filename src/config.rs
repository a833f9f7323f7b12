//! Store options and demo service configuration.
//!
//! Options are parsed tolerantly: anything missing, empty, mistyped or
//! non-positive falls back to its default. The one exception is a capacity
//! value that is not an integer, which fails construction.

use std::collections::HashMap;
use std::env;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::session::codec::KeyPair;

pub const DEFAULT_TABLE_NAME: &str = "session-backend";
pub const DEFAULT_READ_CAPACITY: i64 = 5;
pub const DEFAULT_WRITE_CAPACITY: i64 = 5;
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_MAX_AGE: i64 = 86400 * 30;
pub const DEFAULT_TTL_ENABLED: bool = true;

/// Construction options for the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// DynamoDB table holding one item per session.
    pub table: String,
    /// Provisioned read units, used only when the table is created.
    pub read_capacity: i64,
    /// Provisioned write units, used only when the table is created.
    pub write_capacity: i64,
    pub region: String,
    /// Endpoint override, e.g. a DynamoDB Local instance.
    pub endpoint: Option<String>,
    /// Default session lifetime in seconds.
    pub max_age: i64,
    /// Write a `ttl` attribute and enable expiry on new tables.
    pub ttl_enabled: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE_NAME.into(),
            read_capacity: DEFAULT_READ_CAPACITY,
            write_capacity: DEFAULT_WRITE_CAPACITY,
            region: DEFAULT_REGION.into(),
            endpoint: None,
            max_age: DEFAULT_MAX_AGE,
            ttl_enabled: DEFAULT_TTL_ENABLED,
        }
    }
}

impl StoreOptions {
    /// Build options from a loosely-typed settings bag.
    ///
    /// Recognized keys: `table`, `read_capacity`, `write_capacity`, `region`,
    /// `endpoint`, `max_age`, `ttl_enabled`. Unknown keys are ignored.
    pub fn from_settings<I, K, V>(settings: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let settings: HashMap<String, String> = settings
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().trim().to_string()))
            .collect();

        let mut opts = Self::default();

        if let Some(table) = settings.get("table").filter(|v| !v.is_empty()) {
            opts.table = table.clone();
        }
        if let Some(capacity) = capacity(&settings, "read_capacity")? {
            opts.read_capacity = capacity;
        }
        if let Some(capacity) = capacity(&settings, "write_capacity")? {
            opts.write_capacity = capacity;
        }
        if let Some(region) = settings.get("region").filter(|v| !v.is_empty()) {
            opts.region = region.clone();
        }
        opts.endpoint = settings
            .get("endpoint")
            .filter(|v| !v.is_empty())
            .cloned();
        if let Some(max_age) = settings
            .get("max_age")
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
        {
            opts.max_age = max_age;
        }
        if let Some(enabled) = settings.get("ttl_enabled").and_then(|v| parse_bool(v)) {
            opts.ttl_enabled = enabled;
        }

        Ok(opts)
    }

    /// Load options from `SESSION_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let keys = [
            ("table", "SESSION_TABLE"),
            ("read_capacity", "SESSION_READ_CAPACITY"),
            ("write_capacity", "SESSION_WRITE_CAPACITY"),
            ("region", "SESSION_REGION"),
            ("endpoint", "SESSION_ENDPOINT"),
            ("max_age", "SESSION_MAX_AGE"),
            ("ttl_enabled", "SESSION_TTL_ENABLED"),
        ];
        Self::from_settings(
            keys.iter()
                .filter_map(|(key, var)| env::var(var).ok().map(|v| (*key, v))),
        )
    }
}

/// A capacity must be an integer if present; non-positive means default.
fn capacity(settings: &HashMap<String, String>, key: &str) -> Result<Option<i64>, ConfigError> {
    match settings.get(key).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => {
            let value = raw.parse::<i64>().map_err(|_| ConfigError::InvalidNumber {
                key: key.into(),
                value: raw.clone(),
            })?;
            Ok((value > 0).then_some(value))
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

/// Demo service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cookie_name: String,
    pub session_secret: String,
    /// Base64-encoded 32-byte AES key; cookies are only signed when absent.
    pub encryption_key: Option<String>,
    pub session_backend: String,
    pub session_https_only: bool,
    pub cookie_domain: Option<String>,
    pub store: StoreOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            cookie_name: env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "session".into()),
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "change-me-in-production".into()),
            encryption_key: env::var("SESSION_ENCRYPTION_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            session_backend: env::var("SESSION_BACKEND").unwrap_or_else(|_| "memory".into()),
            session_https_only: env::var("SESSION_HTTPS_ONLY")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            cookie_domain: env::var("SESSION_COOKIE_DOMAIN")
                .ok()
                .filter(|v| !v.is_empty()),
            store: StoreOptions::from_env()?,
        })
    }

    /// Signing/encryption keys derived from the secret settings.
    pub fn key_pairs(&self) -> Result<Vec<KeyPair>, ConfigError> {
        let block_key = match &self.encryption_key {
            Some(encoded) => Some(
                STANDARD
                    .decode(encoded.trim())
                    .map_err(|_| ConfigError::InvalidEncoding("SESSION_ENCRYPTION_KEY".into()))?,
            ),
            None => None,
        };
        Ok(vec![KeyPair {
            hash_key: self.session_secret.as_bytes().to_vec(),
            block_key,
        }])
    }
}

/// Configuration for testing, all fields settable directly.
impl Config {
    pub fn test_default() -> Self {
        Self {
            port: 3000,
            cookie_name: "session".into(),
            session_secret: "test-secret-key".into(),
            encryption_key: None,
            session_backend: "memory".into(),
            session_https_only: false,
            cookie_domain: None,
            store: StoreOptions::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid numeric value for {key}: {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("at least one signing key is required")]
    NoKeys,

    #[error("hash key must not be empty")]
    EmptyHashKey,

    #[error("block key must be 32 bytes, got {0}")]
    InvalidBlockKey(usize),

    #[error("invalid base64 in {0}")]
    InvalidEncoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = StoreOptions::default();
        assert_eq!(opts.table, "session-backend");
        assert_eq!(opts.read_capacity, 5);
        assert_eq!(opts.write_capacity, 5);
        assert_eq!(opts.region, "us-east-1");
        assert_eq!(opts.endpoint, None);
        assert_eq!(opts.max_age, 2_592_000);
        assert!(opts.ttl_enabled);
    }

    #[test]
    fn test_from_settings_overrides() {
        let opts = StoreOptions::from_settings([
            ("table", "t1"),
            ("read_capacity", "10"),
            ("write_capacity", "7"),
            ("region", "ap-south-1"),
            ("endpoint", "http://localhost:8000"),
            ("max_age", "3600"),
            ("ttl_enabled", "false"),
        ])
        .unwrap();
        assert_eq!(opts.table, "t1");
        assert_eq!(opts.read_capacity, 10);
        assert_eq!(opts.write_capacity, 7);
        assert_eq!(opts.region, "ap-south-1");
        assert_eq!(opts.endpoint.as_deref(), Some("http://localhost:8000"));
        assert_eq!(opts.max_age, 3600);
        assert!(!opts.ttl_enabled);
    }

    #[test]
    fn test_empty_and_non_positive_fall_back() {
        let opts = StoreOptions::from_settings([
            ("table", ""),
            ("region", ""),
            ("read_capacity", "-1"),
            ("write_capacity", "0"),
            ("max_age", "-5"),
            ("endpoint", ""),
        ])
        .unwrap();
        assert_eq!(opts, StoreOptions::default());
    }

    #[test]
    fn test_mistyped_non_capacity_values_fall_back() {
        let opts = StoreOptions::from_settings([
            ("max_age", "a month"),
            ("ttl_enabled", "sometimes"),
            ("unknown", "ignored"),
        ])
        .unwrap();
        assert_eq!(opts.max_age, DEFAULT_MAX_AGE);
        assert!(opts.ttl_enabled);
    }

    #[test]
    fn test_unparseable_capacity_is_an_error() {
        let err = StoreOptions::from_settings([("read_capacity", "five")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { ref key, .. } if key == "read_capacity"));

        let err = StoreOptions::from_settings([("write_capacity", "1.5")]).unwrap_err();
        assert!(err.to_string().contains("write_capacity"));
    }

    #[test]
    fn test_key_pairs_without_encryption() {
        let cfg = Config::test_default();
        let pairs = cfg.key_pairs().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].hash_key, b"test-secret-key");
        assert!(pairs[0].block_key.is_none());
    }

    #[test]
    fn test_key_pairs_rejects_bad_base64() {
        let mut cfg = Config::test_default();
        cfg.encryption_key = Some("!!not base64!!".into());
        assert!(matches!(
            cfg.key_pairs(),
            Err(ConfigError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_key_pairs_with_encryption() {
        let mut cfg = Config::test_default();
        cfg.encryption_key = Some(STANDARD.encode([7u8; 32]));
        let pairs = cfg.key_pairs().unwrap();
        assert_eq!(pairs[0].block_key.as_deref(), Some(&[7u8; 32][..]));
    }
}
