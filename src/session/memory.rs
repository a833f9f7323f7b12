//! In-memory session backend for development and testing.
//!
//! Uses `DashMap` for concurrent access without external locks. Records are
//! dropped lazily once their TTL has passed.

use dashmap::DashMap;

use super::{SessionBackend, StoredRecord};
use crate::error::StoreError;

/// In-memory session store.
///
/// Not suitable for production: sessions are lost on restart and not
/// shared across processes. Use DynamoDB backend for production.
#[derive(Default)]
pub struct InMemoryBackend {
    store: DashMap<String, StoredRecord>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored (including expired).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Raw record access, bypassing expiry.
    pub fn get_raw(&self, session_id: &str) -> Option<StoredRecord> {
        self.store.get(session_id).map(|e| e.value().clone())
    }
}

impl SessionBackend for InMemoryBackend {
    async fn load(&self, session_id: &str) -> Result<Option<StoredRecord>, StoreError> {
        let Some(entry) = self.store.get(session_id) else {
            return Ok(None);
        };
        let record = entry.value().clone();
        drop(entry); // Release the read lock before removing

        if record.is_expired(chrono::Utc::now().timestamp()) {
            self.store.remove(session_id);
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn save(&self, record: &StoredRecord) -> Result<(), StoreError> {
        self.store.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.store.remove(session_id);
        Ok(())
    }
}
