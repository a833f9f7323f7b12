//! The session store: cookie codecs over a pluggable backend.
//!
//! Read-path problems (missing cookie, bad signature, absent or expired
//! record, undecodable payload) all produce a fresh session. Only
//! construction and `save` return errors.

use axum::http::request::Parts;
use axum::http::{HeaderMap, Request};
use rand::Rng;

use super::codec::{Codec, KeyPair, codecs_from_pairs, decode_multi, encode_multi};
use super::cookie;
use super::dynamodb::DynamoDbBackend;
use super::registry::{SessionHandle, SessionRegistry};
use super::{CookieOptions, Session, SessionBackend, SessionValues, StoredRecord};
use crate::config::StoreOptions;
use crate::error::StoreError;

/// Session store persisted in DynamoDB.
pub type DynamoStore = SessionStore<DynamoDbBackend>;

pub struct SessionStore<B: SessionBackend> {
    backend: B,
    codecs: Vec<Box<dyn Codec>>,
    options: CookieOptions,
    ttl_enabled: bool,
}

impl DynamoStore {
    /// Connect to DynamoDB and provision the session table if needed.
    pub async fn connect(options: StoreOptions, key_pairs: &[KeyPair]) -> Result<Self, StoreError> {
        let codecs = codecs_from_pairs(key_pairs)?;
        let backend = DynamoDbBackend::connect(&options).await?;
        tracing::info!(
            "Session store ready (table: {}, region: {})",
            options.table,
            options.region
        );
        Ok(Self::build(backend, codecs, &options))
    }
}

impl<B: SessionBackend> SessionStore<B> {
    /// Build a store over an already-provisioned backend.
    pub fn with_backend(
        backend: B,
        options: &StoreOptions,
        key_pairs: &[KeyPair],
    ) -> Result<Self, StoreError> {
        let codecs = codecs_from_pairs(key_pairs)?;
        Ok(Self::build(backend, codecs, options))
    }

    fn build(backend: B, codecs: Vec<Box<dyn Codec>>, options: &StoreOptions) -> Self {
        let mut store = Self {
            backend,
            codecs,
            options: CookieOptions::default(),
            ttl_enabled: options.ttl_enabled,
        };
        store.set_max_age(options.max_age);
        store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Default options copied into every new session.
    pub fn options(&self) -> &CookieOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut CookieOptions {
        &mut self.options
    }

    pub fn ttl_enabled(&self) -> bool {
        self.ttl_enabled
    }

    /// Change the default session lifetime and the age ceiling of every
    /// codec that has one. Existing sessions keep their own options.
    pub fn set_max_age(&mut self, age: i64) {
        self.options.max_age = age;
        for codec in &mut self.codecs {
            if let Some(limited) = codec.as_age_limited() {
                limited.set_max_age(age);
            }
        }
    }

    /// A fresh session, populated from storage when the request carries a
    /// valid cookie for `name` and the record can be loaded.
    pub async fn new_session(&self, headers: &HeaderMap, name: &str) -> Session {
        let mut session = Session::new(name, self.options.clone());

        let Some(value) = cookie::find_cookie(headers, name) else {
            return session;
        };

        let id = match decode_multi(name, value, &self.codecs)
            .map(String::from_utf8)
        {
            Ok(Ok(id)) if !id.is_empty() => id,
            Ok(_) => {
                tracing::debug!("Session cookie {} carried an unusable id", name);
                return session;
            }
            Err(e) => {
                tracing::debug!("Ignoring session cookie {}: {}", name, e);
                return session;
            }
        };

        session.id = id;
        match self.load(&mut session).await {
            Ok(()) => session.is_new = false,
            Err(e) => tracing::debug!("Starting new session for {}: {}", session.id, e),
        }
        session
    }

    /// Like `new_session`, but the session is registered on the request and
    /// later calls with the same name return the same instance.
    pub async fn get<T>(&self, request: &mut Request<T>, name: &str) -> SessionHandle {
        let registry = SessionRegistry::of(request.extensions_mut());
        self.get_registered(&registry, request.headers(), name).await
    }

    /// `get` for handlers and extractors that only hold the request parts.
    pub async fn get_from_parts(&self, parts: &mut Parts, name: &str) -> SessionHandle {
        let registry = SessionRegistry::of(&mut parts.extensions);
        self.get_registered(&registry, &parts.headers, name).await
    }

    async fn get_registered(
        &self,
        registry: &SessionRegistry,
        headers: &HeaderMap,
        name: &str,
    ) -> SessionHandle {
        if let Some(handle) = registry.get(name) {
            return handle;
        }
        let handle = SessionHandle::new(self.new_session(headers, name).await);
        registry.insert(name, handle.clone());
        handle
    }

    /// Load stored values into `session`, whose id must be set.
    pub async fn load(&self, session: &mut Session) -> Result<(), StoreError> {
        let record = self
            .backend
            .load(&session.id)
            .await?
            .ok_or(StoreError::NotFound)?;

        if record.is_expired(chrono::Utc::now().timestamp()) {
            return Err(StoreError::NotFound);
        }

        let raw = decode_multi(session.name(), &record.data, &self.codecs)?;
        let values: SessionValues = serde_json::from_slice(&raw)?;
        session.values = values;
        Ok(())
    }

    /// Persist the session and set its cookie, or delete both when
    /// `max_age <= 0`.
    ///
    /// If encoding the cookie fails after the record was written, the record
    /// stays persisted. A backend error returns before any cookie is set.
    ///
    /// The stored values go through the same codecs as the cookie, so their
    /// encoded form is capped at 4096 bytes (roughly 3 KB of JSON). Larger
    /// sessions fail with `CodecError::ValueTooLong`.
    pub async fn save(&self, headers: &mut HeaderMap, session: &mut Session) -> Result<(), StoreError> {
        if session.options.max_age <= 0 {
            if !session.id.is_empty() {
                self.backend.delete(&session.id).await?;
                tracing::debug!("Deleted session {}", session.id);
            }
            return cookie::set_cookie(headers, session.name(), "", &session.options);
        }

        if session.id.is_empty() {
            session.id = generate_session_id();
        }

        let payload = serde_json::to_vec(&session.values)?;
        let data = encode_multi(session.name(), &payload, &self.codecs)?;
        let now = chrono::Utc::now().timestamp();
        let record = StoredRecord {
            id: session.id.clone(),
            data,
            modified_at: now,
            ttl: self
                .ttl_enabled
                .then(|| now.saturating_add(session.options.max_age)),
        };
        self.backend.save(&record).await?;

        let encoded = encode_multi(session.name(), session.id.as_bytes(), &self.codecs)?;
        cookie::set_cookie(headers, session.name(), &encoded, &session.options)?;
        session.is_new = false;
        tracing::debug!("Saved session {}", session.id);
        Ok(())
    }

    /// Save every session registered on a request, in name order. Stops at
    /// the first failure.
    ///
    /// A session that is still new and empty has nothing to persist and is
    /// skipped, unless it is marked for deletion.
    pub async fn save_all(
        &self,
        registry: &SessionRegistry,
        headers: &mut HeaderMap,
    ) -> Result<(), StoreError> {
        for (name, handle) in registry.handles() {
            let mut session = handle.lock().await;
            if session.is_new && session.values.is_empty() && session.options.max_age > 0 {
                continue;
            }
            if let Err(e) = self.save(headers, &mut session).await {
                tracing::error!("Failed to save session {}: {}", name, e);
                return Err(e);
            }
        }
        Ok(())
    }
}

/// 32 random bytes, base32 without padding.
fn generate_session_id() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    data_encoding::BASE32_NOPAD.encode(&bytes)
}
