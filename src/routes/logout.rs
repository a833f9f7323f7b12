//! POST /logout

use axum::Json;

use super::CurrentSession;
use crate::types::SuccessResponse;

/// Mark the session for deletion; the middleware removes the record and
/// clears the cookie.
pub async fn logout(CurrentSession(session): CurrentSession) -> Json<SuccessResponse> {
    let mut session = session.lock().await;
    session.values.clear();
    session.options.max_age = -1;
    Json(SuccessResponse { success: true })
}
