//! Per-request session registry.
//!
//! The registry lives in the request extensions so that repeated lookups of
//! the same session name within one request share a single instance. Clones
//! of a registry share the same map, which lets middleware see sessions that
//! a handler registered.

use axum::http::Extensions;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::MutexGuard;

use super::Session;

/// Shared handle to a registered session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<tokio::sync::Mutex<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(session)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.inner.lock().await
    }

    /// Whether both handles point at the same session instance.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Sessions registered against one request, keyed by cookie name.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<BTreeMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    /// The registry attached to these extensions, created on first use.
    pub fn of(extensions: &mut Extensions) -> SessionRegistry {
        extensions.get_or_insert_default::<SessionRegistry>().clone()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, SessionHandle>> {
        // Entries are plain handles, so a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Option<SessionHandle> {
        self.sessions().get(name).cloned()
    }

    pub fn insert(&self, name: &str, handle: SessionHandle) {
        self.sessions().insert(name.to_string(), handle);
    }

    /// Registered sessions in name order.
    pub fn handles(&self) -> Vec<(String, SessionHandle)> {
        self.sessions()
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}
