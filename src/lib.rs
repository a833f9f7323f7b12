//! Cookie-based HTTP sessions persisted in DynamoDB.
//!
//! `session::store::SessionStore` is the library entry point. The router in
//! this module is a small demo service that exercises it end to end.

pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod types;

use axum::Router;
use axum::middleware::from_fn;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::session::AnyBackend;
use crate::session::middleware::session_middleware;
use crate::session::store::SessionStore;

pub use crate::config::StoreOptions;
pub use crate::error::StoreError;
pub use crate::session::codec::KeyPair;
pub use crate::session::store::DynamoStore;
pub use crate::session::{CookieOptions, Session, SessionValues};

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<SessionStore<AnyBackend>>,
}

/// Build the Axum router with session middleware and routes.
pub fn create_app(state: Arc<AppState>) -> Router {
    let store = state.store.clone();

    Router::new()
        .route("/health", axum::routing::get(routes::health::health))
        .route(
            "/session",
            axum::routing::get(routes::session::get_session)
                .post(routes::session::update_session),
        )
        .route("/logout", axum::routing::post(routes::logout::logout))
        .layer(from_fn(move |req, next| {
            let store = store.clone();
            session_middleware(store, req, next)
        }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
