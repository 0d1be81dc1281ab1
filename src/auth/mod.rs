//! Placeholder authentication route group.
//!
//! Mounted at `/api/auth` when no real collaborator is supplied. Each
//! endpoint answers `501 Not Implemented`; paths are relative to the mount.

use axum::{
    extract::OriginalUri,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct NotImplemented {
    pub error: &'static str,
    pub path: String,
}

pub fn routes() -> Router {
    Router::new()
        .route("/sign-up", post(not_implemented))
        .route("/sign-in", post(not_implemented))
        .route("/sign-out", post(not_implemented))
}

async fn not_implemented(OriginalUri(uri): OriginalUri) -> (StatusCode, Json<NotImplemented>) {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(NotImplemented {
            error: "authentication is not configured",
            path: uri.path().to_string(),
        }),
    )
}
