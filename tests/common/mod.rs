//! Test utilities: app builder over the in-memory backend, cookie helpers.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use dynamo_session_store::config::Config;
use dynamo_session_store::session::AnyBackend;
use dynamo_session_store::session::memory::InMemoryBackend;
use dynamo_session_store::session::store::SessionStore;
use dynamo_session_store::{AppState, create_app};
use serde_json::Value;
use std::sync::Arc;

/// Build a test app with InMemoryBackend.
pub fn build_test_app() -> (axum::Router, Arc<AppState>) {
    build_test_app_with_config(Config::test_default())
}

/// Build a test app with a custom Config.
pub fn build_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let key_pairs = config.key_pairs().expect("test keys are valid");
    let store = SessionStore::with_backend(
        AnyBackend::Memory(InMemoryBackend::new()),
        &config.store,
        &key_pairs,
    )
    .expect("failed to build store");

    let state = Arc::new(AppState {
        config,
        store: Arc::new(store),
    });

    let app = create_app(state.clone());
    (app, state)
}

/// The in-memory backend behind a test app.
pub fn memory_backend(state: &AppState) -> &InMemoryBackend {
    match state.store.backend() {
        AnyBackend::Memory(b) => b,
        AnyBackend::DynamoDb(_) => panic!("test app uses the in-memory backend"),
    }
}

/// Extract `name=value` of the session cookie from a response.
pub fn session_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|s| s.starts_with(&format!("{name}=")))
        .and_then(|s| s.split(';').next())
        .map(String::from)
}

/// The full `Set-Cookie` header for the session cookie.
pub fn set_cookie_header(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|s| s.starts_with(&format!("{name}=")))
        .map(String::from)
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("Cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("Cookie", cookie);
    }
    builder
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

/// Helper to read response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
