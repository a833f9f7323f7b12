//! Request/response DTOs for the demo routes.

use serde::Serialize;

use crate::session::SessionValues;

/// GET /session response.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub is_new: bool,
    pub values: SessionValues,
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
}

/// Generic success response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}
