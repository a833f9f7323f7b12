//! GET /session, POST /session

use axum::Json;

use super::CurrentSession;
use crate::error::AppError;
use crate::types::{SessionResponse, SuccessResponse};

/// Return the values of the caller's session.
pub async fn get_session(CurrentSession(session): CurrentSession) -> Json<SessionResponse> {
    let session = session.lock().await;
    Json(SessionResponse {
        is_new: session.is_new,
        values: session.values.clone(),
    })
}

/// Merge a JSON object into the session values. Saved by the middleware.
pub async fn update_session(
    CurrentSession(session): CurrentSession,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<SuccessResponse>, AppError> {
    let serde_json::Value::Object(fields) = body else {
        return Err(AppError::BadRequest("Expected a JSON object".into()));
    };

    let mut session = session.lock().await;
    for (key, value) in fields {
        session.values.set(&key, value);
    }
    Ok(Json(SuccessResponse { success: true }))
}
