/**
 * About Routes
 * API endpoints for the about-page singleton: bio fields, skills, clients,
 * portrait and section visibility
 */
use std::convert::Infallible;

use axum::{
    extract::{Multipart, Path},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::blob::ImageFile;
use crate::models::AboutPatch;
use crate::routes::auth::verify_auth;
use crate::routes::{core_unavailable, sync_error_response, ErrorResponse};
use crate::sync::get_core;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for POST /api/about/skills
#[derive(Debug, Deserialize, Serialize)]
pub struct AddSkillRequest {
    pub name: String,
    pub percentage: u8,
}

/// Request body for PATCH /api/about/skills/{name}; at least one field
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SkillPatchRequest {
    pub name: Option<String>,
    pub percentage: Option<u8>,
}

/// Response for POST /api/about/visibility/{section}
#[derive(Debug, Deserialize, Serialize)]
pub struct VisibilityResponse {
    pub section: String,
    pub visible: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/about
/// Never 404s: default content is served until the first save
pub async fn get_about() -> impl IntoResponse {
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };
    (StatusCode::OK, Json(core.about.current().await)).into_response()
}

/// PATCH /api/about (requires auth)
/// Partial update: only the supplied fields are written
pub async fn update_about(headers: HeaderMap, Json(patch): Json<AboutPatch>) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    match core.about.update_field(patch).await {
        Ok(content) => (StatusCode::OK, Json(content)).into_response(),
        Err(e) => sync_error_response(e, "Failed to update about content").into_response(),
    }
}

/// POST /api/about/portrait (multipart: image; requires auth)
pub async fn upload_portrait(headers: HeaderMap, mut multipart: Multipart) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    let mut image: Option<ImageFile> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart error: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Invalid multipart data".to_string(),
                        message: None,
                    }),
                )
                    .into_response();
            }
        };
        if field.name() == Some("image") {
            let file_name = field.file_name().unwrap_or("portrait").to_string();
            match field.bytes().await {
                Ok(bytes) => {
                    image = Some(ImageFile {
                        file_name,
                        bytes: bytes.to_vec(),
                    })
                }
                Err(e) => {
                    tracing::error!("Failed to read upload bytes: {}", e);
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ErrorResponse {
                            error: "Failed to read file data".to_string(),
                            message: None,
                        }),
                    )
                        .into_response();
                }
            }
        }
    }

    let image = match image {
        Some(image) => image,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Image is required".to_string(),
                    message: None,
                }),
            )
                .into_response();
        }
    };

    match core.about.upload_portrait(image).await {
        Ok(content) => (StatusCode::OK, Json(content)).into_response(),
        Err(e) => sync_error_response(e, "Failed to upload portrait").into_response(),
    }
}

/// POST /api/about/skills (requires auth)
pub async fn add_skill(
    headers: HeaderMap,
    Json(payload): Json<AddSkillRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    match core.about.add_skill(&payload.name, payload.percentage).await {
        Ok(content) => (StatusCode::CREATED, Json(content)).into_response(),
        Err(e) => sync_error_response(e, "Failed to add skill").into_response(),
    }
}

/// PATCH /api/about/skills/{name} (requires auth)
/// Matches by name and affects every skill with that name. The percentage
/// change is applied before the rename so both can ride in one request.
pub async fn update_skill(
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(patch): Json<SkillPatchRequest>,
) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    if patch.name.is_none() && patch.percentage.is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "No fields to update".to_string(),
                message: None,
            }),
        )
            .into_response();
    }

    if let Some(percentage) = patch.percentage {
        if let Err(e) = core.about.set_skill_percentage(&name, percentage).await {
            return sync_error_response(e, "Failed to update skill").into_response();
        }
    }
    if let Some(new_name) = &patch.name {
        if let Err(e) = core.about.rename_skill(&name, new_name).await {
            return sync_error_response(e, "Failed to update skill").into_response();
        }
    }

    (StatusCode::OK, Json(core.about.current().await)).into_response()
}

/// DELETE /api/about/skills/{name} (requires auth)
/// Removes every skill with that name; idempotent
pub async fn delete_skill(headers: HeaderMap, Path(name): Path<String>) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    match core.about.delete_skill(&name).await {
        Ok(content) => (StatusCode::OK, Json(content)).into_response(),
        Err(e) => sync_error_response(e, "Failed to delete skill").into_response(),
    }
}

/// GET /api/about/visibility
pub async fn get_visibility() -> impl IntoResponse {
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };
    (StatusCode::OK, Json(core.visibility.snapshot().await)).into_response()
}

/// POST /api/about/visibility/{section} (requires auth)
/// Flips one section and returns its new value
pub async fn toggle_visibility(
    headers: HeaderMap,
    Path(section): Path<String>,
) -> impl IntoResponse {
    if let Err(err_response) = verify_auth(&headers) {
        return err_response.into_response();
    }
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    match core.visibility.toggle(&section).await {
        Ok(visible) => (
            StatusCode::OK,
            Json(VisibilityResponse { section, visible }),
        )
            .into_response(),
        Err(e) => sync_error_response(e, "Failed to toggle section").into_response(),
    }
}

/// GET /api/about/events
/// Server-sent events: the full about content, once on connect and again
/// after every change. Absence materializes the defaults.
pub async fn about_events() -> impl IntoResponse {
    let core = match get_core() {
        Some(c) => c,
        None => return core_unavailable().into_response(),
    };

    let feed = core.about.subscribe().await;
    let stream = futures::stream::unfold(feed, |mut feed| async move {
        let content = feed.next().await?;
        let event = match Event::default().event("about").json_data(&content) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("Failed to serialize about content: {}", e);
                return None;
            }
        };
        Some((Ok::<_, Infallible>(event), feed))
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
