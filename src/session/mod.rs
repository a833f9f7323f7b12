//! Server-side session management.
//!
//! Provides the `SessionBackend` trait for pluggable storage, the signing
//! codecs, cookie rendering, and the `SessionStore` that ties them together.

pub mod codec;
pub mod cookie;
pub mod dynamodb;
pub mod memory;
pub mod middleware;
pub mod registry;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StoreError;

/// Session values, a loosely-typed dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionValues {
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
}

impl SessionValues {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Per-session cookie attributes.
///
/// `max_age <= 0` marks the session for deletion on the next save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".into(),
            domain: None,
            max_age: crate::config::DEFAULT_MAX_AGE,
            secure: false,
            http_only: true,
            same_site: Some(SameSite::Lax),
        }
    }
}

/// A single named session, created by the store and saved back through it.
#[derive(Debug, Clone)]
pub struct Session {
    /// Empty until the first save assigns a token.
    pub id: String,
    pub values: SessionValues,
    pub options: CookieOptions,
    pub is_new: bool,
    name: String,
}

impl Session {
    pub fn new(name: impl Into<String>, options: CookieOptions) -> Self {
        Self {
            id: String::new(),
            values: SessionValues::new(),
            options,
            is_new: true,
            name: name.into(),
        }
    }

    /// The cookie name this session is stored under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The persisted form of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    /// Codec output for the session values; never stored unsigned.
    pub data: String,
    pub modified_at: i64,
    /// Absolute expiry in unix seconds.
    pub ttl: Option<i64>,
}

impl StoredRecord {
    /// Expired records are treated as absent even before the backend
    /// purges them.
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.ttl, Some(ttl) if ttl <= now)
    }
}

/// Pluggable session storage backend.
///
/// Each call is a single atomic key-value operation. Implementations must
/// be `Send + Sync` for use in Axum's async handlers.
pub trait SessionBackend: Send + Sync {
    /// Load a record by session id. `Ok(None)` when absent.
    fn load(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<StoredRecord>, StoreError>> + Send;

    /// Create or overwrite a record.
    fn save(
        &self,
        record: &StoredRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a record. Deleting a missing record succeeds.
    fn delete(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

/// Type-erased session backend supporting both InMemory and DynamoDB.
///
/// Since `SessionBackend` uses RPITIT, it's not object-safe. This enum
/// dispatches manually instead.
pub enum AnyBackend {
    Memory(memory::InMemoryBackend),
    DynamoDb(dynamodb::DynamoDbBackend),
}

impl SessionBackend for AnyBackend {
    async fn load(&self, session_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        match self {
            AnyBackend::Memory(b) => b.load(session_id).await,
            AnyBackend::DynamoDb(b) => b.load(session_id).await,
        }
    }

    async fn save(&self, record: &StoredRecord) -> Result<(), StoreError> {
        match self {
            AnyBackend::Memory(b) => b.save(record).await,
            AnyBackend::DynamoDb(b) => b.save(record).await,
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        match self {
            AnyBackend::Memory(b) => b.delete(session_id).await,
            AnyBackend::DynamoDb(b) => b.delete(session_id).await,
        }
    }
}

/// Backend whose every call fails, for exercising error paths.
#[cfg(test)]
pub(crate) struct FailingBackend;

#[cfg(test)]
impl SessionBackend for FailingBackend {
    async fn load(&self, _session_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        Err(StoreError::Backend("load unavailable".into()))
    }

    async fn save(&self, _record: &StoredRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("save unavailable".into()))
    }

    async fn delete(&self, _session_id: &str) -> Result<(), StoreError> {
        Err(StoreError::Backend("delete unavailable".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_accessors() {
        let mut values = SessionValues::new();
        assert!(values.is_empty());
        values.set("name", "alice");
        values.set("id", 43);
        assert_eq!(values.len(), 2);
        assert_eq!(values.get("name").unwrap(), "alice");
        assert_eq!(values.remove("id"), Some(serde_json::json!(43)));
        values.clear();
        assert!(values.is_empty());
    }

    #[test]
    fn test_values_serialize_flat() {
        let mut values = SessionValues::new();
        values.set("name", "alice");
        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(json, serde_json::json!({"name": "alice"}));
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new("s", CookieOptions::default());
        assert!(session.is_new);
        assert!(session.id.is_empty());
        assert!(session.values.is_empty());
        assert_eq!(session.name(), "s");
        assert_eq!(session.options.path, "/");
    }

    #[test]
    fn test_record_expiry_boundary() {
        let mut record = StoredRecord {
            id: "a".into(),
            data: "d".into(),
            modified_at: 100,
            ttl: Some(200),
        };
        assert!(!record.is_expired(199));
        assert!(record.is_expired(200));
        assert!(record.is_expired(201));

        record.ttl = None;
        assert!(!record.is_expired(i64::MAX));
    }
}
