//! HTTP route handlers.

pub mod health;
pub mod logout;
pub mod session;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use std::sync::Arc;

use crate::AppState;
use crate::session::registry::SessionHandle;

/// The session named by the configured cookie, registered on the request.
pub struct CurrentSession(pub SessionHandle);

impl FromRequestParts<Arc<AppState>> for CurrentSession {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let handle = state
            .store
            .get_from_parts(parts, &state.config.cookie_name)
            .await;
        Ok(CurrentSession(handle))
    }
}
