//! Axum session middleware.
//!
//! Attaches a `SessionRegistry` to each request. Handlers register the
//! sessions they touch (through `SessionStore::get_from_parts` or an
//! extractor built on it); after the handler returns, every registered
//! session is saved and its cookie appended to the response. Sessions that
//! are still new and empty are skipped, so requests that only read get no
//! cookie and no write.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::SessionBackend;
use super::registry::SessionRegistry;
use super::store::SessionStore;

/// Axum middleware function for session handling.
pub async fn session_middleware<B: SessionBackend + 'static>(
    store: Arc<SessionStore<B>>,
    mut req: Request,
    next: Next,
) -> Response {
    let registry = SessionRegistry::of(req.extensions_mut());

    let mut response = next.run(req).await;

    if registry.is_empty() {
        return response;
    }

    if let Err(e) = store.save_all(&registry, response.headers_mut()).await {
        return e.into_response();
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreOptions;
    use crate::session::FailingBackend;
    use crate::session::codec::KeyPair;
    use crate::session::memory::InMemoryBackend;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use axum::middleware::from_fn;
    use tower::ServiceExt;

    fn app<B: SessionBackend + 'static>(store: Arc<SessionStore<B>>) -> Router {
        let handler_store = store.clone();
        Router::new()
            .route("/touch", axum::routing::get(move |mut req: Request| {
                let store = handler_store.clone();
                async move {
                    let handle = store.get(&mut req, "s").await;
                    handle.lock().await.values.set("touched", true);
                    StatusCode::OK
                }
            }))
            .route("/noop", axum::routing::get(|| async { StatusCode::OK }))
            .layer(from_fn(move |req, next| {
                let store = store.clone();
                session_middleware(store, req, next)
            }))
    }

    fn store() -> Arc<SessionStore<InMemoryBackend>> {
        Arc::new(
            SessionStore::with_backend(
                InMemoryBackend::new(),
                &StoreOptions::default(),
                &[KeyPair::signing("secret")],
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_touched_session_is_saved() {
        let store = store();
        let req = axum::http::Request::builder()
            .uri("/touch")
            .body(Body::empty())
            .unwrap();
        let resp = app(store.clone()).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key(header::SET_COOKIE));
        assert_eq!(store.backend().len(), 1);
    }

    #[tokio::test]
    async fn test_read_only_session_is_not_persisted() {
        let store = store();
        let read_store = store.clone();
        let app = Router::new()
            .route("/read", axum::routing::get(move |mut req: Request| {
                let store = read_store.clone();
                async move {
                    let handle = store.get(&mut req, "s").await;
                    let is_new = handle.lock().await.is_new;
                    is_new.to_string()
                }
            }))
            .layer(from_fn({
                let store = store.clone();
                move |req, next| session_middleware(store.clone(), req, next)
            }));

        let req = axum::http::Request::builder()
            .uri("/read")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert!(!resp.headers().contains_key(header::SET_COOKIE));
        assert!(store.backend().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_returns_500() {
        let store = Arc::new(
            SessionStore::with_backend(
                FailingBackend,
                &StoreOptions::default(),
                &[KeyPair::signing("secret")],
            )
            .unwrap(),
        );
        let req = axum::http::Request::builder()
            .uri("/touch")
            .body(Body::empty())
            .unwrap();
        let resp = app(store).oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!resp.headers().contains_key(header::SET_COOKIE));
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Failed to persist session");
    }

    #[tokio::test]
    async fn test_untouched_request_sets_no_cookie() {
        let store = store();
        let req = axum::http::Request::builder()
            .uri("/noop")
            .body(Body::empty())
            .unwrap();
        let resp = app(store.clone()).oneshot(req).await.unwrap();

        assert!(!resp.headers().contains_key(header::SET_COOKIE));
        assert!(store.backend().is_empty());
    }
}
