/**
 * Routes Module
 * API route handlers
 */
use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::sync::SyncError;

pub mod about;
pub mod auth;
pub mod contact;
pub mod gallery;
pub mod health;
pub mod logs;

/// Shared error body: `error` is the short machine-facing reason, `message`
/// an optional human-facing detail.
#[derive(Debug, Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Map a sync-core failure onto the HTTP surface. `fallback` is the message
/// used for internal failures so provider errors never leak to clients.
pub fn sync_error_response(e: SyncError, fallback: &str) -> (StatusCode, Json<ErrorResponse>) {
    let (status, error) = match &e {
        SyncError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        SyncError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        SyncError::Store(crate::store::StoreError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, "Not found".to_string())
        }
        SyncError::Blob(crate::blob::BlobError::Empty) => {
            (StatusCode::BAD_REQUEST, "Empty file".to_string())
        }
        SyncError::Blob(crate::blob::BlobError::TooLarge) => (
            StatusCode::BAD_REQUEST,
            "File too large. Maximum size is 10MB.".to_string(),
        ),
        SyncError::Blob(crate::blob::BlobError::UnsupportedType) => (
            StatusCode::BAD_REQUEST,
            "File content does not match an allowed image type.".to_string(),
        ),
        _ => {
            tracing::error!("Request failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, fallback.to_string())
        }
    };
    (
        status,
        Json(ErrorResponse {
            error,
            message: None,
        }),
    )
}

/// 503 body used by handlers when the sync core has not been initialized.
pub fn core_unavailable() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse {
            error: "Service not ready".to_string(),
            message: None,
        }),
    )
}
