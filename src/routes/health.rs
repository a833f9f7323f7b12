//! GET /health

use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::session::AnyBackend;
use crate::types::HealthResponse;

/// Health check. Returns OK + which session backend is in use.
pub async fn health(State(state): State<Arc<crate::AppState>>) -> Json<HealthResponse> {
    let backend = match state.store.backend() {
        AnyBackend::Memory(_) => "memory",
        AnyBackend::DynamoDb(_) => "dynamodb",
    };
    Json(HealthResponse {
        status: "ok".into(),
        backend: backend.into(),
    })
}
